use clap::{Arg, ArgAction, Command};
use num_enum::TryFromPrimitive;

mod command_census;
mod command_vote;
mod command_voting;
mod rest;

#[derive(TryFromPrimitive, PartialEq, Eq, PartialOrd, Copy, Clone)]
#[repr(u8)]
pub enum Verbosity {
    Silent = 0,
    Error = 1,
    Warn = 2,
    Info = 3,
}

fn voting_id_arg() -> Arg {
    Arg::new("VOTING-ID")
        .index(1)
        .required(true)
        .value_parser(clap::value_parser!(u64))
        .help("Voting identifier")
}

fn voters_arg() -> Arg {
    Arg::new("VOTERS")
        .index(2)
        .required(true)
        .num_args(1..)
        .value_parser(clap::value_parser!(u64))
        .help("Voter identifiers")
}

fn cli() -> Command {
    Command::new("decide")
        .version("0.1.0")
        .about("Interacts with a decide voting server")
        .arg(
            Arg::new("uri")
                .long("uri")
                .global(true)
                .help("Set the server uri - can also be set with DECIDE_URI"),
        )
        .arg(
            Arg::new("token")
                .long("token")
                .global(true)
                .help("Set the API token - can also be set with DECIDE_TOKEN"),
        )
        .arg(
            Arg::new("v")
                .short('v')
                .action(ArgAction::Count)
                .global(true)
                .help("Sets the level of verbosity"),
        )
        .arg(
            Arg::new("quiet")
                .short('q')
                .action(ArgAction::SetTrue)
                .global(true)
                .conflicts_with("v")
                .help("Print nothing but results"),
        )
        .subcommand_required(true)
        .subcommand(
            Command::new("voting")
                .about("Create and manage votings")
                .subcommand_required(true)
                .subcommand(
                    Command::new("create")
                        .about("Create a voting")
                        .arg(Arg::new("name").long("name").required(true))
                        .arg(Arg::new("desc").long("desc"))
                        .arg(Arg::new("question").long("question").required(true))
                        .arg(
                            Arg::new("option")
                                .long("option")
                                .action(ArgAction::Append)
                                .required_unless_present("binary")
                                .help("An option of the question, repeat for each option"),
                        )
                        .arg(
                            Arg::new("binary")
                                .long("binary")
                                .action(ArgAction::SetTrue)
                                .conflicts_with("option")
                                .help("Yes/no question"),
                        )
                        .arg(
                            Arg::new("public")
                                .long("public")
                                .action(ArgAction::SetTrue),
                        ),
                )
                .subcommand(Command::new("list").about("List votings"))
                .subcommand(
                    Command::new("show")
                        .about("Show a voting")
                        .arg(voting_id_arg()),
                )
                .subcommand(Command::new("start").about("Start a voting").arg(voting_id_arg()))
                .subcommand(Command::new("stop").about("Stop a voting").arg(voting_id_arg()))
                .subcommand(
                    Command::new("tally")
                        .about("Tally a stopped voting")
                        .arg(voting_id_arg()),
                )
                .subcommand(
                    Command::new("ballots")
                        .about("Dump the encrypted ballots of a voting")
                        .arg(voting_id_arg()),
                ),
        )
        .subcommand(
            Command::new("census")
                .about("Manage the census of a voting")
                .subcommand_required(true)
                .subcommand(
                    Command::new("add")
                        .about("Add voters to the census")
                        .arg(voting_id_arg())
                        .arg(voters_arg()),
                )
                .subcommand(
                    Command::new("remove")
                        .about("Remove voters from the census")
                        .arg(voting_id_arg())
                        .arg(voters_arg()),
                )
                .subcommand(
                    Command::new("check")
                        .about("Check whether a voter is in the census")
                        .arg(voting_id_arg())
                        .arg(
                            Arg::new("VOTER")
                                .index(2)
                                .required(true)
                                .value_parser(clap::value_parser!(u64)),
                        ),
                ),
        )
        .subcommand(
            Command::new("vote")
                .about("Encrypt a selection and cast it")
                .arg(voting_id_arg())
                .arg(
                    Arg::new("OPTION")
                        .index(2)
                        .required(true)
                        .help("Option number or label"),
                )
                .arg(
                    Arg::new("voter")
                        .long("voter")
                        .required(true)
                        .value_parser(clap::value_parser!(u64))
                        .help("Your voter identifier"),
                ),
        )
}

fn main() {
    let matches = cli().get_matches();

    let verbosity = if matches.get_flag("quiet") {
        Verbosity::Silent
    } else {
        Verbosity::try_from(matches.get_count("v").min(1) + 2).unwrap_or(Verbosity::Info)
    };

    let env_uri = std::env::var("DECIDE_URI").ok();
    let uri = matches
        .get_one::<String>("uri")
        .cloned()
        .or(env_uri)
        .unwrap_or_else(|| "http://localhost:8000".to_owned());
    let token = matches
        .get_one::<String>("token")
        .cloned()
        .or_else(|| std::env::var("DECIDE_TOKEN").ok());
    if verbosity >= Verbosity::Info {
        println!("URI: {}", uri);
    }

    let api = rest::Api::new(&uri, token);

    let result = match matches.subcommand() {
        Some(("voting", matches)) => command_voting::command_voting(matches, &api),
        Some(("census", matches)) => command_census::command_census(matches, &api),
        Some(("vote", matches)) => command_vote::command_vote(matches, &api),
        _ => Ok(()),
    };

    if let Err(e) = result {
        if verbosity >= Verbosity::Error {
            eprintln!("decide: {:#}", e);
        }
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_line_is_consistent() {
        cli().debug_assert();
    }

    #[test]
    fn parse_vote() {
        let matches = cli()
            .try_get_matches_from(["decide", "vote", "3", "dog", "--voter", "12"])
            .unwrap();
        let (name, vote) = matches.subcommand().unwrap();
        assert_eq!(name, "vote");
        assert_eq!(vote.get_one::<u64>("VOTING-ID"), Some(&3));
        assert_eq!(vote.get_one::<String>("OPTION").unwrap(), "dog");
        assert_eq!(vote.get_one::<u64>("voter"), Some(&12));
    }
}
