//! jq command-line options accepted from clients.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The whitelisted subset of jq flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum JqOption {
    #[serde(rename = "-c")]
    Compact,
    #[serde(rename = "-n")]
    NullInput,
    #[serde(rename = "-R")]
    RawInput,
    #[serde(rename = "-r")]
    RawOutput,
    #[serde(rename = "-s")]
    Slurp,
    #[serde(rename = "-S")]
    SortKeys,
}

impl JqOption {
    pub fn as_flag(&self) -> &'static str {
        match self {
            JqOption::Compact => "-c",
            JqOption::NullInput => "-n",
            JqOption::RawInput => "-R",
            JqOption::RawOutput => "-r",
            JqOption::Slurp => "-s",
            JqOption::SortKeys => "-S",
        }
    }

    /// Parse a comma-separated list such as `-c,-r`. Blank entries are skipped.
    pub fn parse_list(list: &str) -> Result<Vec<JqOption>, Vec<UnknownOption>> {
        Self::parse_all(list.split(','))
    }

    /// Parse every flag, reporting all unknown ones. The result is sorted and
    /// deduplicated.
    pub fn parse_all<'a>(
        flags: impl IntoIterator<Item = &'a str>,
    ) -> Result<Vec<JqOption>, Vec<UnknownOption>> {
        let mut options = Vec::new();
        let mut unknown = Vec::new();
        for flag in flags.into_iter().map(str::trim).filter(|s| !s.is_empty()) {
            match flag.parse() {
                Ok(option) => options.push(option),
                Err(err) => unknown.push(err),
            }
        }
        if !unknown.is_empty() {
            return Err(unknown);
        }
        options.sort_unstable();
        options.dedup();
        Ok(options)
    }
}

impl FromStr for JqOption {
    type Err = UnknownOption;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "-c" => Ok(JqOption::Compact),
            "-n" => Ok(JqOption::NullInput),
            "-R" => Ok(JqOption::RawInput),
            "-r" => Ok(JqOption::RawOutput),
            "-s" => Ok(JqOption::Slurp),
            "-S" => Ok(JqOption::SortKeys),
            other => Err(UnknownOption(other.to_string())),
        }
    }
}

impl fmt::Display for JqOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_flag())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported option `{0}` (allowed: -c, -n, -R, -r, -s, -S)")]
pub struct UnknownOption(pub String);
