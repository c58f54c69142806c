use crate::*;
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

pub type VotingId = u64;
pub type VoterId = u64;

/// A single answer to a question
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct QuestionOption {
    /// Unique within a question. This is the value a ballot encrypts.
    pub number: u32,
    pub option: String,

    /// Binary questions tag their options as yes and no
    #[serde(default)]
    pub yes: bool,
    #[serde(default)]
    pub no: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Question {
    pub desc: String,
    pub options: Vec<QuestionOption>,
}

impl Question {
    pub fn new(desc: impl Into<String>) -> Self {
        Question {
            desc: desc.into(),
            options: vec![],
        }
    }

    /// Append an option, numbering it after the highest existing number
    pub fn add_option(&mut self, option: impl Into<String>, yes: bool, no: bool) -> u32 {
        let number = self.options.iter().map(|o| o.number).max().unwrap_or(0) + 1;
        self.options.push(QuestionOption {
            number,
            option: option.into(),
            yes,
            no,
        });
        number
    }

    /// Build a yes/no question
    pub fn binary(desc: impl Into<String>) -> Self {
        let mut question = Question::new(desc);
        question.add_option("", true, false);
        question.add_option("", false, true);
        question
    }

    /// Get the option with the given number
    pub fn get_option(&self, number: u32) -> Option<&QuestionOption> {
        self.options.iter().find(|o| o.number == number)
    }

    pub fn is_binary(&self) -> bool {
        self.options.len() == 2
            && self.options.iter().filter(|o| o.yes).count() == 1
            && self.options.iter().filter(|o| o.no).count() == 1
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.desc.trim().is_empty() {
            return Err(Error::InvalidVoting("question description is required".into()));
        }
        if self.options.is_empty() {
            return Err(Error::InvalidVoting("question needs at least one option".into()));
        }

        let mut numbers = BTreeSet::new();
        for option in self.options.iter() {
            if !numbers.insert(option.number) {
                return Err(Error::InvalidVoting(format!(
                    "duplicate option number {}",
                    option.number
                )));
            }
            if option.yes && option.no {
                return Err(Error::InvalidVoting(format!(
                    "option {} is tagged both yes and no",
                    option.number
                )));
            }
        }

        let tagged = self.options.iter().any(|o| o.yes || o.no);
        if tagged && !self.is_binary() {
            return Err(Error::InvalidVoting(
                "yes/no options require exactly one yes and one no option".into(),
            ));
        }

        Ok(())
    }
}

/// Reference to a tally authority (mixnet node)
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AuthorityRef {
    pub name: String,
    pub url: String,

    /// Set on the authority run alongside this deployment
    #[serde(default)]
    pub me: bool,
}

/// A voting instance
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Voting {
    pub id: VotingId,
    pub name: String,
    pub desc: Option<String>,
    pub public: bool,
    pub question: Question,
    pub auths: Vec<AuthorityRef>,
    pub status: VotingStatus,
    pub pub_key: Option<PublicKey>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,

    /// Decrypted option numbers, one per ballot. Set once, when tallied.
    pub tally: Option<Vec<u32>>,

    /// Per-option counts, in question order. Set once, when tallied.
    pub postproc: Option<Vec<OptionResult>>,
}

impl Voting {
    /// The authority that is asked first: our own if present, else the first listed
    pub fn primary_authority(&self) -> Option<&AuthorityRef> {
        self.auths
            .iter()
            .find(|a| a.me)
            .or_else(|| self.auths.first())
    }
}

/// A voting to be created
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct NewVoting {
    pub name: String,
    pub desc: Option<String>,
    #[serde(default)]
    pub public: bool,
    pub question: Question,
    pub auths: Vec<AuthorityRef>,
}

impl NewVoting {
    pub fn new(name: impl Into<String>, question: Question, auths: Vec<AuthorityRef>) -> Self {
        NewVoting {
            name: name.into(),
            desc: None,
            public: false,
            question,
            auths,
        }
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.name.trim().is_empty() {
            return Err(Error::InvalidVoting("name is required".into()));
        }
        self.question.validate()?;
        if self.auths.is_empty() {
            return Err(Error::InvalidVoting("at least one authority is required".into()));
        }
        for auth in self.auths.iter() {
            if auth.url.trim().is_empty() {
                return Err(Error::InvalidVoting(format!(
                    "authority {} has no url",
                    auth.name
                )));
            }
        }
        Ok(())
    }

    /// Turn the validated payload into a stored voting
    pub fn into_voting(self, id: VotingId) -> Voting {
        Voting {
            id,
            name: self.name,
            desc: self.desc,
            public: self.public,
            question: self.question,
            auths: self.auths,
            status: VotingStatus::NotStarted,
            pub_key: None,
            start_date: None,
            end_date: None,
            tally: None,
            postproc: None,
        }
    }
}

/// Voting creation payload as posted by admin clients
///
/// `{"name": .., "desc": .., "question": "..", "question_opt": ["cat", "dog"]}`
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct VotingRequest {
    pub name: Option<String>,
    pub desc: Option<String>,
    pub question: Option<String>,
    pub question_opt: Option<Vec<String>>,
    #[serde(default)]
    pub public: bool,
    #[serde(default)]
    pub binary: bool,
    #[serde(default)]
    pub auths: Vec<AuthorityRef>,
}

impl VotingRequest {
    /// Build a voting, attaching `default_authority` if the request names none
    pub fn into_new_voting(self, default_authority: &AuthorityRef) -> Result<NewVoting, Error> {
        let name = self
            .name
            .ok_or_else(|| Error::InvalidVoting("name is required".into()))?;
        let desc = self
            .question
            .ok_or_else(|| Error::InvalidVoting("question is required".into()))?;

        let question = if self.binary {
            Question::binary(desc)
        } else {
            let labels = self
                .question_opt
                .ok_or_else(|| Error::InvalidVoting("question_opt is required".into()))?;
            let mut question = Question::new(desc);
            for label in labels {
                question.add_option(label, false, false);
            }
            question
        };

        let auths = if self.auths.is_empty() {
            vec![default_authority.clone()]
        } else {
            self.auths
        };

        let new_voting = NewVoting {
            name,
            desc: self.desc,
            public: self.public,
            question,
            auths,
        };
        new_voting.validate()?;

        Ok(new_voting)
    }
}
