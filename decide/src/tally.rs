use crate::*;
use indexmap::IndexMap;
use std::convert::TryFrom;

/// Votes received by one option
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct OptionResult {
    pub option: String,
    pub number: u32,
    pub votes: u64,
}

/// Outcome of aggregating a decrypted batch
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TallyResult {
    /// Decrypted selections in the order the authority returned them
    pub tally: Vec<u32>,

    /// One entry per question option, in question order
    pub postproc: Vec<OptionResult>,
}

impl TallyResult {
    /// Count cleartext selections per option.
    ///
    /// Every selection must name an option of `question`; an unknown value fails the whole tally.
    pub fn tally(question: &Question, selections: &[u64]) -> Result<Self, Error> {
        let mut totals: IndexMap<u32, u64> =
            question.options.iter().map(|o| (o.number, 0)).collect();
        let mut tally = Vec::with_capacity(selections.len());

        for selection in selections {
            let count = u32::try_from(*selection)
                .ok()
                .and_then(|number| totals.get_mut(&number).map(|count| (number, count)));

            match count {
                Some((number, count)) => {
                    *count += 1;
                    tally.push(number);
                }
                None => {
                    return Err(Error::MalformedTallyResult(format!(
                        "decrypted selection {} matches no option",
                        selection
                    )))
                }
            }
        }

        let postproc = question
            .options
            .iter()
            .map(|o| OptionResult {
                option: o.option.clone(),
                number: o.number,
                votes: totals[&o.number],
            })
            .collect();

        Ok(TallyResult { tally, postproc })
    }

    pub fn num_votes(&self) -> u64 {
        self.postproc.iter().map(|r| r.votes).sum()
    }

    /// Votes for the option with the given number
    pub fn votes_for(&self, number: u32) -> Option<u64> {
        self.postproc
            .iter()
            .find(|r| r.number == number)
            .map(|r| r.votes)
    }
}
