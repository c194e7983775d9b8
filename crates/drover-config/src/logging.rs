use strum::{Display, EnumString, VariantNames};

/// Line format of the daemon's stderr log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, EnumString, Display, VariantNames)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum LogFormat {
    /// One flattened JSON object per event, for log shippers.
    #[default]
    Json,
    /// Single human-readable line per event, tagged with the reactor thread.
    Compact,
}

/// Error returned when `--log-format` names no known format.
pub type LogFormatParseError = strum::ParseError;

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::Config;

    #[rstest]
    #[case("json", LogFormat::Json)]
    #[case("COMPACT", LogFormat::Compact)]
    fn parses_case_insensitively(#[case] input: &str, #[case] expected: LogFormat) {
        assert_eq!(input.parse::<LogFormat>().expect("parse format"), expected);
    }

    #[test]
    fn every_advertised_name_is_accepted_on_the_command_line() {
        for name in LogFormat::VARIANTS {
            let config = Config::load_from_iter(["droverd", "--log-format", *name])
                .expect("advertised format parses");
            assert_eq!(config.log_format().to_string(), *name);
        }
    }

    #[test]
    fn rejects_unknown_format() {
        assert!("pretty".parse::<LogFormat>().is_err());
    }
}
