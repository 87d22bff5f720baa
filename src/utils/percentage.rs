use std::{fmt::Display, ops::Deref, str::FromStr};

use anyhow::anyhow;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct Percentage(f64);

impl Display for Percentage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}%", self.0)
    }
}

impl Percentage {
    pub fn new_opt(value: f64) -> Option<Percentage> {
        if value < 0. {
            None
        } else {
            Some(Percentage(value))
        }
    }
}

impl FromStr for Percentage {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // This means that 100%% also works, but I think I'm fine with that
        let s = s.trim_end_matches("%");
        let v = s.parse::<f64>()?;
        Percentage::new_opt(v).ok_or_else(|| anyhow!("Can't parse {s} into percentage"))
    }
}

impl Deref for Percentage {
    type Target = f64;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Share of `value` in `whole`. An empty whole has no shares, so it yields 0%.
pub fn seconds_percentage(value: i64, whole: i64) -> Percentage {
    if whole <= 0 {
        return Percentage(0.);
    }
    Percentage(value.max(0) as f64 / whole as f64 * 100.)
}

#[cfg(test)]
mod tests {
    use super::{seconds_percentage, Percentage};

    #[test]
    fn parses_with_and_without_sign() {
        assert_eq!("5".parse::<Percentage>().ok(), Percentage::new_opt(5.));
        assert_eq!("12.5%".parse::<Percentage>().ok(), Percentage::new_opt(12.5));
        assert!("-1".parse::<Percentage>().is_err());
    }

    #[test]
    fn share_of_whole() {
        assert_eq!(*seconds_percentage(30, 120), 25.);
        assert_eq!(*seconds_percentage(30, 0), 0.);
    }
}
