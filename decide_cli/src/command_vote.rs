use crate::command_voting::voting_id;
use crate::rest::Api;
use anyhow::{anyhow, bail, Context};
use decide::{BallotSubmission, Question, VoterId, Voting};
use rand::{CryptoRng, Rng};

pub fn command_vote(matches: &clap::ArgMatches, api: &Api) -> anyhow::Result<()> {
    let voting = api.get_voting(voting_id(matches))?;
    let choice = matches.get_one::<String>("OPTION").cloned().unwrap_or_default();
    let voter_id = matches.get_one::<u64>("voter").copied().unwrap_or_default();

    let ballot = build_ballot(&voting, &choice, voter_id, &mut rand::thread_rng())?;
    api.submit_ballot(&ballot)?;
    println!("Ballot accepted");
    Ok(())
}

fn build_ballot<R: Rng + CryptoRng>(
    voting: &Voting,
    choice: &str,
    voter_id: VoterId,
    rng: &mut R,
) -> anyhow::Result<BallotSubmission> {
    let number = resolve_option(&voting.question, choice)?;
    let key = voting
        .pub_key
        .as_ref()
        .ok_or_else(|| anyhow!("voting {} has no public key yet", voting.id))?;
    key.validate()
        .with_context(|| format!("voting {} has an unusable public key", voting.id))?;

    // The selection never leaves this machine in the clear
    let vote = key.encrypt(u64::from(number), rng);

    Ok(BallotSubmission {
        voting_id: voting.id,
        voter_id,
        vote,
    })
}

/// Find the option by number, by label, or by yes/no on binary questions
fn resolve_option(question: &Question, choice: &str) -> anyhow::Result<u32> {
    let choice = choice.trim();

    if let Ok(number) = choice.parse::<u32>() {
        if question.get_option(number).is_some() {
            return Ok(number);
        }
        bail!("no option number {}", number);
    }

    let found = question.options.iter().find(|o| {
        o.option.eq_ignore_ascii_case(choice)
            || (o.yes && choice.eq_ignore_ascii_case("yes"))
            || (o.no && choice.eq_ignore_ascii_case("no"))
    });
    match found {
        Some(option) => Ok(option.number),
        None => bail!("no option {:?}", choice),
    }
}
