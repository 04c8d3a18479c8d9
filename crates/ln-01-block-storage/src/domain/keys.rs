//! # Collection Key Schema
//!
//! Keys are UTF-8 strings `"<collection>:<part>[:<part>...]"`. Block numbers
//! are zero-padded to 20 digits (the width of `u64::MAX`) so lexicographic
//! order equals numeric order.

/// Persisted collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Block,
    Account,
    Node,
    Schedule,
    PendingBlock,
    BlockConfirmation,
    Lock,
    Meta,
}

impl Collection {
    pub const ALL: [Collection; 8] = [
        Collection::Block,
        Collection::Account,
        Collection::Node,
        Collection::Schedule,
        Collection::PendingBlock,
        Collection::BlockConfirmation,
        Collection::Lock,
        Collection::Meta,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Collection::Block => "block",
            Collection::Account => "account",
            Collection::Node => "node",
            Collection::Schedule => "schedule",
            Collection::PendingBlock => "pending_block",
            Collection::BlockConfirmation => "block_confirmation",
            Collection::Lock => "lock",
            Collection::Meta => "meta",
        }
    }

    /// Scan prefix covering the whole collection.
    pub fn prefix(&self) -> Vec<u8> {
        format!("{}:", self.name()).into_bytes()
    }

    /// Key built from already formatted parts.
    pub fn key(&self, parts: &[&str]) -> Vec<u8> {
        let mut key = self.name().to_owned();
        for part in parts {
            key.push(':');
            key.push_str(part);
        }
        key.into_bytes()
    }
}

/// Fixed-width block number.
pub fn number(value: u64) -> String {
    format!("{value:020}")
}

/// Parse the `index`-th part (after the collection name) of a key as a block number.
pub fn parse_number(key: &[u8], index: usize) -> Option<u64> {
    std::str::from_utf8(key)
        .ok()?
        .split(':')
        .nth(index + 1)?
        .parse()
        .ok()
}

pub fn block(number: u64) -> Vec<u8> {
    Collection::Block.key(&[self::number(number).as_str()])
}

pub fn account(account_number: &str) -> Vec<u8> {
    Collection::Account.key(&[account_number])
}

pub fn node(identifier: &str) -> Vec<u8> {
    Collection::Node.key(&[identifier])
}

pub fn schedule(number: u64) -> Vec<u8> {
    Collection::Schedule.key(&[self::number(number).as_str()])
}

pub fn pending_block(number: u64, hash: &str) -> Vec<u8> {
    Collection::PendingBlock.key(&[self::number(number).as_str(), hash])
}

/// Prefix of every pending block staged for `number`.
pub fn pending_blocks_for(number: u64) -> Vec<u8> {
    let mut key = Collection::PendingBlock.key(&[self::number(number).as_str()]);
    key.push(b':');
    key
}

pub fn block_confirmation(number: u64, hash: &str, signer: &str) -> Vec<u8> {
    Collection::BlockConfirmation.key(&[self::number(number).as_str(), hash, signer])
}

/// Prefix of every confirmation for `number`, any hash.
pub fn block_confirmations_for(number: u64) -> Vec<u8> {
    let mut key = Collection::BlockConfirmation.key(&[self::number(number).as_str()]);
    key.push(b':');
    key
}

/// Prefix of every confirmation for one `(number, hash)` candidate.
pub fn block_confirmations_for_hash(number: u64, hash: &str) -> Vec<u8> {
    let mut key = Collection::BlockConfirmation.key(&[self::number(number).as_str(), hash]);
    key.push(b':');
    key
}

pub fn lock(name: &str) -> Vec<u8> {
    Collection::Lock.key(&[name])
}

/// Number of the last appended block.
pub fn last_block_number() -> Vec<u8> {
    Collection::Meta.key(&["last_block_number"])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_keys_sort_numerically() {
        assert!(block(9) < block(10));
        assert!(block(99) < block(100));
    }

    #[test]
    fn test_parse_number_roundtrip() {
        assert_eq!(parse_number(&block(42), 0), Some(42));
        assert_eq!(parse_number(&block_confirmation(7, "ab", "cd"), 0), Some(7));
        assert_eq!(parse_number(b"garbage", 0), None);
    }

    #[test]
    fn test_prefix_scopes() {
        let key = block_confirmation(3, "ab", "cd");
        assert!(key.starts_with(&block_confirmations_for(3)));
        assert!(key.starts_with(&block_confirmations_for_hash(3, "ab")));
        assert!(!key.starts_with(&block_confirmations_for(30)));
        assert!(key.starts_with(&Collection::BlockConfirmation.prefix()));
        assert!(!block(1).starts_with(&Collection::BlockConfirmation.prefix()));
    }

    #[test]
    fn test_collection_prefixes_do_not_overlap() {
        for a in Collection::ALL {
            for b in Collection::ALL {
                if a != b {
                    assert!(!a.prefix().starts_with(&b.prefix()));
                }
            }
        }
    }
}
