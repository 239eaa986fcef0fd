use clap::{CommandFactory, Parser, Subcommand, ValueEnum};

/// One prompt line. Multicall: the first word is the command.
#[derive(Parser, Debug)]
#[command(multicall = true)]
struct Line {
    #[command(subcommand)]
    command: ConsoleCommand,
}

#[derive(Subcommand, Clone, Debug, Eq, PartialEq)]
pub enum ConsoleCommand {
    /// Search medications (entrada)
    Search {
        #[arg(required = true)]
        query: Vec<String>,
    },
    /// Reopen the last suggestion list (entrada)
    Suggestions,
    /// Use suggestion n (entrada)
    Pick {
        #[arg(value_parser = position)]
        position: usize,
    },
    /// Look up a lot code (salida)
    Scan { code: String },
    /// Fill patient data from a CURP or full name (salida)
    Patient {
        #[arg(required = true)]
        query: Vec<String>,
    },
    /// add <qty> for a scanned lot, or
    /// add <qty> <lote> <caducidad> <precio> <presentacion_id> [presentacion]
    Add {
        #[arg(allow_hyphen_values = true)]
        quantity: String,
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        fields: Vec<String>,
    },
    /// Remove row n
    #[command(alias = "rm")]
    Remove {
        #[arg(value_parser = position)]
        position: usize,
    },
    /// Show the list
    List,
    /// Sum the list
    Total,
    /// Empty the list
    Clear,
    /// Set a form field
    Set {
        field: String,
        #[arg(required = true, allow_hyphen_values = true)]
        value: Vec<String>,
    },
    /// Show the form fields
    Header,
    /// Save everything in one request
    #[command(alias = "save")]
    Commit,
    /// Download the entry report
    Report {
        #[arg(value_enum, ignore_case = true)]
        format: ReportKind,
    },
    /// Set the CPM of the picked medication (entrada)
    Cpm {
        #[arg(allow_hyphen_values = true)]
        value: String,
        /// Units on hand, to show the alert level
        #[arg(long)]
        stock: Option<u64>,
    },
    /// Edit the scanned lot: codigo= existencia= cpm= presentacion= caducidad= (salida)
    Lot {
        #[arg(required = true)]
        changes: Vec<String>,
    },
    /// Stage the rows of a CSV export (carga)
    Preview { path: String },
    /// Upload a spreadsheet (carga)
    Upload { path: String },
    /// Write the bulk upload template (carga)
    Template,
    /// Show the cart event journal
    History,
    #[command(alias = "exit")]
    Quit,
}

#[derive(ValueEnum, Clone, Copy, Debug, Eq, PartialEq)]
pub enum ReportKind {
    Pdf,
    #[value(alias = "excel")]
    Xlsx,
}

pub fn help() -> String {
    Line::command().render_help().to_string()
}

/// `Ok(None)` for blank lines. The command word is case-insensitive.
pub fn parse(line: &str) -> Result<Option<ConsoleCommand>, clap::Error> {
    let mut words: Vec<String> = line.split_whitespace().map(str::to_string).collect();
    let Some(verb) = words.first_mut() else {
        return Ok(None);
    };
    *verb = verb.to_lowercase();

    Line::try_parse_from(words).map(|line| Some(line.command))
}

fn position(raw: &str) -> Result<usize, String> {
    match raw.parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err("expected a row number starting at 1".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use clap::error::ErrorKind;

    use super::*;

    fn words(s: &str) -> Vec<String> {
        s.split_whitespace().map(String::from).collect()
    }

    #[test]
    fn parses_verbs_and_arguments() {
        assert_eq!(parse("   ").unwrap(), None);
        assert_eq!(
            parse("search  para cetamol").unwrap(),
            Some(ConsoleCommand::Search {
                query: words("para cetamol")
            })
        );
        assert_eq!(
            parse("RM 2").unwrap(),
            Some(ConsoleCommand::Remove { position: 2 })
        );
        assert_eq!(
            parse("add 5 A1 2027-01-31 10.00 3 CAJA").unwrap(),
            Some(ConsoleCommand::Add {
                quantity: "5".to_string(),
                fields: words("A1 2027-01-31 10.00 3 CAJA"),
            })
        );
        assert_eq!(
            parse("set recibido_por Maria Lopez").unwrap(),
            Some(ConsoleCommand::Set {
                field: "recibido_por".to_string(),
                value: words("Maria Lopez"),
            })
        );
        assert_eq!(parse("save").unwrap(), Some(ConsoleCommand::Commit));
        assert_eq!(
            parse("report EXCEL").unwrap(),
            Some(ConsoleCommand::Report {
                format: ReportKind::Xlsx
            })
        );
    }

    #[test]
    fn negative_values_reach_the_validators() {
        assert_eq!(
            parse("add -3").unwrap(),
            Some(ConsoleCommand::Add {
                quantity: "-3".to_string(),
                fields: Vec::new(),
            })
        );
        assert_eq!(
            parse("cpm -5 --stock 40").unwrap(),
            Some(ConsoleCommand::Cpm {
                value: "-5".to_string(),
                stock: Some(40),
            })
        );
    }

    #[test]
    fn rejects_bad_input() {
        assert_eq!(parse("rm 0").unwrap_err().kind(), ErrorKind::ValueValidation);
        assert_eq!(parse("pick x").unwrap_err().kind(), ErrorKind::ValueValidation);
        assert!(parse("scan").is_err());
        assert!(parse("set folio").is_err());
        assert!(parse("report doc").is_err());
        assert_eq!(
            parse("frobnicate").unwrap_err().kind(),
            ErrorKind::InvalidSubcommand
        );
    }

    #[test]
    fn help_lists_every_command() {
        assert_eq!(parse("help").unwrap_err().kind(), ErrorKind::DisplayHelp);

        let text = help();
        for verb in ["search", "scan", "commit", "preview", "cpm", "lot", "history"] {
            assert!(text.contains(verb), "{} missing from help", verb);
        }
    }
}
