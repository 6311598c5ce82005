/// One URL per line; surrounding whitespace and blank lines are dropped.
pub fn parse_url_lines(input: &str) -> Vec<String> {
    input
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// "2 of 5 downloads failed", or `None` when nothing failed.
pub fn failure_summary(failed: usize, total: usize) -> Option<String> {
    (failed > 0).then(|| format!("{} of {} downloads failed", failed, total))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_url_lines() {
        let input = "  https://a \n\nhttps://b\r\n   \nhttps://c";
        assert_eq!(
            parse_url_lines(input),
            vec!["https://a", "https://b", "https://c"]
        );
    }

    #[test]
    fn test_parse_url_lines_empty() {
        assert!(parse_url_lines("\n  \n").is_empty());
    }

    #[test]
    fn test_failure_summary() {
        assert_eq!(failure_summary(0, 3), None);
        assert_eq!(failure_summary(1, 3).as_deref(), Some("1 of 3 downloads failed"));
        assert_eq!(failure_summary(2, 3).as_deref(), Some("2 of 3 downloads failed"));
    }
}
