use crate::command_voting::voting_id;
use crate::rest::Api;

pub fn command_census(matches: &clap::ArgMatches, api: &Api) -> anyhow::Result<()> {
    match matches.subcommand() {
        Some(("add", matches)) => {
            let added = api.add_census(voting_id(matches), &voters(matches))?;
            println!("{} voters added", added);
        }
        Some(("remove", matches)) => {
            let removed = api.remove_census(voting_id(matches), &voters(matches))?;
            println!("{} voters removed", removed);
        }
        Some(("check", matches)) => {
            let voter = matches.get_one::<u64>("VOTER").copied().unwrap_or_default();
            if api.check_census(voting_id(matches), voter)? {
                println!("Valid voter");
            } else {
                println!("Invalid voter");
                std::process::exit(2);
            }
        }
        _ => {}
    }
    Ok(())
}

fn voters(matches: &clap::ArgMatches) -> Vec<u64> {
    matches
        .get_many::<u64>("VOTERS")
        .map(|voters| voters.copied().collect())
        .unwrap_or_default()
}
