//! Merge operator seam.
//!
//! A merge operator is a user-supplied associative fold combining a key's
//! existing value with buffered merge operands. The applier invokes it when
//! folding successive merge entries at write time; the read path uses the
//! same operator when resolving operand chains.

/// User-supplied associative merge fold.
pub trait MergeOperator: Send + Sync {
    /// Name of the operator, recorded for diagnostics.
    fn name(&self) -> &str;

    /// Combine the existing value (None when the key is absent) with the
    /// operands, oldest first.
    ///
    /// Returning None signals operator failure; the caller keeps the raw
    /// operand and surfaces problems at read time.
    fn full_merge(
        &self,
        key: &[u8],
        existing_value: Option<&[u8]>,
        operands: &[&[u8]],
    ) -> Option<Vec<u8>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Concatenates operands onto the existing value with ',' separators.
    struct AppendOperator;

    impl MergeOperator for AppendOperator {
        fn name(&self) -> &str {
            "append"
        }

        fn full_merge(
            &self,
            _key: &[u8],
            existing_value: Option<&[u8]>,
            operands: &[&[u8]],
        ) -> Option<Vec<u8>> {
            let mut out = existing_value.map(|v| v.to_vec()).unwrap_or_default();
            for operand in operands {
                if !out.is_empty() {
                    out.push(b',');
                }
                out.extend_from_slice(operand);
            }
            Some(out)
        }
    }

    #[test]
    fn test_full_merge_with_existing() {
        let op = AppendOperator;
        let merged = op.full_merge(b"k", Some(b"a"), &[b"b", b"c"]).unwrap();
        assert_eq!(merged, b"a,b,c");
    }

    #[test]
    fn test_full_merge_without_existing() {
        let op = AppendOperator;
        let merged = op.full_merge(b"k", None, &[b"x"]).unwrap();
        assert_eq!(merged, b"x");
    }
}
