pub fn split_csv(s: &str) -> Vec<String> {
    s.split(',')
        .map(|x| x.trim().to_string())
        .filter(|x| !x.is_empty())
        .collect()
}

/// Parse a comma-separated seed list; blank entries are skipped.
pub fn parse_seeds(s: &str) -> anyhow::Result<Vec<u64>> {
    split_csv(s)
        .iter()
        .map(|seed| {
            seed.parse::<u64>()
                .map_err(|err| anyhow::anyhow!("invalid seed '{seed}': {err}"))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_csv_trims_and_filters() {
        let parts = split_csv(" alpha, ,beta,  gamma ");
        assert_eq!(parts, vec!["alpha", "beta", "gamma"]);
    }

    #[test]
    fn parse_seeds_rejects_garbage() {
        assert_eq!(parse_seeds("1, 2,,3").unwrap(), vec![1, 2, 3]);
        assert!(parse_seeds("1,abc").is_err());
    }
}
