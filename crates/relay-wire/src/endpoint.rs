/// Splits a comma-separated endpoint list into an ordered sequence of
/// trimmed, non-empty endpoints.
///
/// Unlike the original C implementation (which tokenised the string
/// destructively with `strtok`), this is a non-destructive iterator-based
/// split: the input is never mutated and empty entries (from a trailing
/// comma, or `",,"`) are dropped.
pub fn parse_endpoint_list(list: &str) -> Vec<String> {
    list.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_owned).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_and_trims() {
        let got = parse_endpoint_list(" tcp://a:1 , tcp://b:2,tcp://c:3 ");
        assert_eq!(got, vec!["tcp://a:1", "tcp://b:2", "tcp://c:3"]);
    }

    #[test]
    fn single_endpoint() {
        assert_eq!(parse_endpoint_list("tcp://127.0.0.1:5555"), vec!["tcp://127.0.0.1:5555"]);
    }

    #[test]
    fn drops_empty_entries() {
        assert_eq!(parse_endpoint_list("tcp://a:1,,tcp://b:2,"), vec!["tcp://a:1", "tcp://b:2"]);
    }

    #[test]
    fn empty_string_yields_no_endpoints() {
        assert!(parse_endpoint_list("").is_empty());
        assert!(parse_endpoint_list("   ").is_empty());
    }
}
