#![forbid(unsafe_code)]

use std::collections::BTreeMap;

/// `--name value` pairs plus bare switches. Unknown flags are rejected.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Flags {
    values: BTreeMap<String, String>,
    switches: Vec<String>,
}

impl Flags {
    pub fn parse(args: &[String], valued: &[&str], switches: &[&str]) -> Result<Self, String> {
        let mut out = Flags::default();
        let mut iter = args.iter();
        while let Some(arg) = iter.next() {
            let name = arg
                .strip_prefix("--")
                .ok_or_else(|| format!("unexpected argument '{arg}'"))?;
            if switches.contains(&name) {
                out.switches.push(name.to_string());
            } else if valued.contains(&name) {
                let value = iter
                    .next()
                    .ok_or_else(|| format!("--{name} requires a value"))?;
                out.values.insert(name.to_string(), value.clone());
            } else {
                return Err(format!("unknown flag --{name}"));
            }
        }
        Ok(out)
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn require(&self, name: &str) -> Result<&str, String> {
        self.get(name).ok_or_else(|| format!("missing --{name}"))
    }

    pub fn switch(&self, name: &str) -> bool {
        self.switches.iter().any(|s| s == name)
    }

    pub fn f64_value(&self, name: &str) -> Result<Option<f64>, String> {
        self.get(name)
            .map(|raw| {
                raw.trim()
                    .parse::<f64>()
                    .map_err(|_| format!("--{name} must be a number, got '{raw}'"))
            })
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn at_cli_args_01_values_and_switches() {
        let f = Flags::parse(
            &argv(&["--label", "Scream", "--emergency", "--confidence", "55.5"]),
            &["label", "confidence"],
            &["emergency"],
        )
        .unwrap();
        assert_eq!(f.get("label"), Some("Scream"));
        assert!(f.switch("emergency"));
        assert_eq!(f.f64_value("confidence").unwrap(), Some(55.5));
        assert!(f.require("threshold").is_err());
    }

    #[test]
    fn at_cli_args_02_rejects_unknown_and_dangling() {
        assert!(Flags::parse(&argv(&["--bogus"]), &["label"], &[]).is_err());
        assert!(Flags::parse(&argv(&["--label"]), &["label"], &[]).is_err());
        assert!(Flags::parse(&argv(&["label"]), &["label"], &[]).is_err());
        let f = Flags::parse(&argv(&["--confidence", "high"]), &["confidence"], &[]).unwrap();
        assert!(f.f64_value("confidence").is_err());
    }
}
