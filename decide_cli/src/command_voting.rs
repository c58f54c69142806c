use crate::rest::Api;
use decide::{Action, Voting, VotingRequest};

pub fn command_voting(matches: &clap::ArgMatches, api: &Api) -> anyhow::Result<()> {
    match matches.subcommand() {
        Some(("create", matches)) => command_voting_create(matches, api),
        Some(("list", _)) => {
            for voting in api.list_votings()? {
                println!("{}\t{}\t{}", voting.id, voting.status, voting.name);
            }
            Ok(())
        }
        Some(("show", matches)) => {
            let voting = api.get_voting(voting_id(matches))?;
            println!("{}", serde_json::to_string_pretty(&voting)?);
            Ok(())
        }
        Some(("start", matches)) => command_voting_action(matches, api, Action::Start),
        Some(("stop", matches)) => command_voting_action(matches, api, Action::Stop),
        Some(("tally", matches)) => {
            command_voting_action(matches, api, Action::Tally)?;
            print_results(&api.get_voting(voting_id(matches))?);
            Ok(())
        }
        Some(("ballots", matches)) => {
            let ballots = api.ballots(voting_id(matches))?;
            println!("{}", serde_json::to_string_pretty(&ballots)?);
            Ok(())
        }
        _ => Ok(()),
    }
}

pub fn voting_id(matches: &clap::ArgMatches) -> u64 {
    // Required by the parser
    matches.get_one::<u64>("VOTING-ID").copied().unwrap_or_default()
}

fn command_voting_create(matches: &clap::ArgMatches, api: &Api) -> anyhow::Result<()> {
    let request = VotingRequest {
        name: matches.get_one::<String>("name").cloned(),
        desc: matches.get_one::<String>("desc").cloned(),
        question: matches.get_one::<String>("question").cloned(),
        question_opt: matches
            .get_many::<String>("option")
            .map(|opts| opts.cloned().collect()),
        public: matches.get_flag("public"),
        binary: matches.get_flag("binary"),
        auths: vec![],
    };

    let voting = api.create_voting(&request)?;
    println!("{}", serde_json::to_string_pretty(&voting)?);
    Ok(())
}

fn command_voting_action(matches: &clap::ArgMatches, api: &Api, action: Action) -> anyhow::Result<()> {
    let message = api.update_voting(voting_id(matches), action)?;
    println!("{}", message);
    Ok(())
}

fn print_results(voting: &Voting) {
    let results = match &voting.postproc {
        Some(results) => results,
        None => return,
    };

    for result in results {
        let label = if result.option.is_empty() {
            match voting.question.get_option(result.number) {
                Some(o) if o.yes => "yes",
                Some(o) if o.no => "no",
                _ => "",
            }
        } else {
            result.option.as_str()
        };
        println!("{}\t{}\t{}", result.number, result.votes, label);
    }
}
