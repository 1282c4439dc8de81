use std::time::Duration;

use clap::Parser;

/// Resolved configuration for one run, parsed once at startup.
#[derive(Parser, Debug, Clone)]
#[command(name = "loilo-shot", version)]
#[command(about = "Takes periodic screenshots of a LoiloNote class note")]
pub struct RunConfig {
    /// School id used on the login form
    #[arg(short, long)]
    pub school: String,

    /// User id
    #[arg(short, long)]
    pub user: String,

    /// Your password
    #[arg(short, long)]
    pub pass: String,

    /// Class id (https://loilonote.app/_/<here is the class id>)
    #[arg(short = 'c', long = "class", value_parser = clap::value_parser!(u32).range(1..))]
    pub class_id: u32,

    /// Note id (https://loilonote.app/_/<class id>/<here is the note id>)
    #[arg(short = 'n', long = "note", value_parser = clap::value_parser!(u32).range(1..))]
    pub note_id: u32,

    /// Time between shots ("500", "5s", "1m"); bare numbers are milliseconds
    #[arg(short, long, value_parser = parse_interval, default_value = "1000")]
    pub interval: Duration,

    /// Only take shots while a screen is being shared by the teacher
    #[arg(long = "if-sharing")]
    pub if_sharing: bool,

    /// Run the browser with a visible window
    #[arg(long)]
    pub debug: bool,
}

/// Parses a human-readable duration into a [`Duration`]. A bare number is
/// taken as milliseconds; `ms`, `s`, `m` and `h` suffixes are accepted,
/// with fractional values ("1.5s" is 1500 ms).
pub fn parse_interval(raw: &str) -> Result<Duration, String> {
    let raw = raw.trim();
    let unit_start = raw
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .unwrap_or(raw.len());
    let (number, unit) = raw.split_at(unit_start);

    let value: f64 = number
        .parse()
        .map_err(|_| format!("invalid duration: {raw:?}"))?;

    let millis = match unit.trim() {
        "" | "ms" => value,
        "s" => value * 1_000.0,
        "m" => value * 60_000.0,
        "h" => value * 3_600_000.0,
        other => return Err(format!("unknown duration unit: {other:?}")),
    };

    if !millis.is_finite() || millis < 1.0 {
        return Err(format!("duration must be at least 1ms, got {raw:?}"));
    }

    Ok(Duration::from_millis(millis.round() as u64))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<RunConfig, clap::Error> {
        RunConfig::try_parse_from(
            std::iter::once("loilo-shot").chain(args.iter().copied()),
        )
    }

    const VALID: &[&str] = &[
        "-s", "myschool", "-u", "me", "-p", "secret", "-c", "123", "-n", "456",
    ];

    #[test]
    fn all_required_flags_present_parses() {
        let cfg = parse(VALID).unwrap();
        assert_eq!(cfg.school, "myschool");
        assert_eq!(cfg.user, "me");
        assert_eq!(cfg.pass, "secret");
        assert_eq!(cfg.class_id, 123);
        assert_eq!(cfg.note_id, 456);
        assert_eq!(cfg.interval, Duration::from_millis(1000));
        assert!(!cfg.if_sharing);
        assert!(!cfg.debug);
    }

    #[test]
    fn each_missing_required_flag_is_named() {
        for (skip, flag) in [
            (0, "--school"),
            (2, "--user"),
            (4, "--pass"),
            (6, "--class"),
            (8, "--note"),
        ] {
            let mut args = VALID.to_vec();
            args.drain(skip..skip + 2);
            let error = parse(&args).unwrap_err().to_string();
            assert!(error.contains(flag), "{flag} not named in: {error}");
        }
    }

    #[test]
    fn all_missing_required_flags_are_listed_together() {
        let error = parse(&[]).unwrap_err().to_string();
        for flag in ["--school", "--user", "--pass", "--class", "--note"] {
            assert!(error.contains(flag), "{flag} not named in: {error}");
        }
    }

    #[test]
    fn zero_ids_are_rejected() {
        let mut args = VALID.to_vec();
        args[7] = "0";
        assert!(parse(&args).is_err());
    }

    #[test]
    fn interval_flag_accepts_duration_syntax() {
        let mut args = VALID.to_vec();
        args.extend(["-i", "5s"]);
        assert_eq!(parse(&args).unwrap().interval, Duration::from_secs(5));
    }

    #[test]
    fn bare_numbers_are_milliseconds() {
        assert_eq!(parse_interval("1000"), Ok(Duration::from_millis(1000)));
        assert_eq!(parse_interval("250ms"), Ok(Duration::from_millis(250)));
    }

    #[test]
    fn suffixes_scale_to_milliseconds() {
        assert_eq!(parse_interval("5s"), Ok(Duration::from_secs(5)));
        assert_eq!(parse_interval("1m"), Ok(Duration::from_secs(60)));
        assert_eq!(parse_interval("2h"), Ok(Duration::from_secs(7200)));
        assert_eq!(parse_interval("1.5s"), Ok(Duration::from_millis(1500)));
    }

    #[test]
    fn garbage_and_non_positive_durations_are_rejected() {
        assert!(parse_interval("").is_err());
        assert!(parse_interval("fast").is_err());
        assert!(parse_interval("5 parsecs").is_err());
        assert!(parse_interval("0").is_err());
        assert!(parse_interval("-5s").is_err());
    }
}
