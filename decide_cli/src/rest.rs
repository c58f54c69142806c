use anyhow::{bail, Context};
use decide::{Action, Ballot, BallotSubmission, Voting, VotingId, VotingRequest, VoterId};
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

/// Blocking client for the daemon's HTTP API
pub struct Api {
    base_uri: String,
    token: Option<String>,
    client: Client,
}

impl Api {
    pub fn new(base_uri: &str, token: Option<String>) -> Self {
        Api {
            base_uri: base_uri.trim_end_matches('/').to_owned(),
            token,
            client: Client::new(),
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let request = self
            .client
            .request(method, format!("{}{}", self.base_uri, path));
        match &self.token {
            Some(token) => request.header("Authorization", format!("Token {}", token)),
            None => request,
        }
    }

    fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> anyhow::Result<T> {
        let res = request.send().context("unable to reach the server")?;
        let status = res.status();
        if !status.is_success() {
            let body = res.text().unwrap_or_default();
            bail!("{} ({})", error_message(&body), status);
        }

        res.json().context("unexpected response from the server")
    }

    pub fn create_voting(&self, voting: &VotingRequest) -> anyhow::Result<Voting> {
        self.send(self.request(Method::POST, "/voting").json(voting))
    }

    pub fn list_votings(&self) -> anyhow::Result<Vec<Voting>> {
        self.send(self.request(Method::GET, "/voting"))
    }

    pub fn get_voting(&self, id: VotingId) -> anyhow::Result<Voting> {
        self.send(self.request(Method::GET, &format!("/voting/{}", id)))
    }

    /// Returns the server's outcome message
    pub fn update_voting(&self, id: VotingId, action: Action) -> anyhow::Result<String> {
        let body = json!({ "action": action.to_string() });
        self.send(self.request(Method::PUT, &format!("/voting/{}", id)).json(&body))
    }

    pub fn add_census(&self, voting: VotingId, voters: &[VoterId]) -> anyhow::Result<usize> {
        let body = json!({ "voting_id": voting, "voters": voters });
        let res: Value = self.send(self.request(Method::POST, "/census").json(&body))?;
        Ok(res["added"].as_u64().unwrap_or(0) as usize)
    }

    pub fn remove_census(&self, voting: VotingId, voters: &[VoterId]) -> anyhow::Result<usize> {
        let body = json!({ "voting_id": voting, "voters": voters });
        let res: Value = self.send(self.request(Method::DELETE, "/census").json(&body))?;
        Ok(res["removed"].as_u64().unwrap_or(0) as usize)
    }

    pub fn check_census(&self, voting: VotingId, voter: VoterId) -> anyhow::Result<bool> {
        let path = format!("/census/{}?voter_id={}", voting, voter);
        let res = self
            .request(Method::GET, &path)
            .send()
            .context("unable to reach the server")?;

        match res.status() {
            StatusCode::OK => Ok(true),
            StatusCode::UNAUTHORIZED => Ok(false),
            status => bail!("{} ({})", error_message(&res.text().unwrap_or_default()), status),
        }
    }

    pub fn submit_ballot(&self, ballot: &BallotSubmission) -> anyhow::Result<()> {
        let _: Value = self.send(self.request(Method::POST, "/store").json(ballot))?;
        Ok(())
    }

    pub fn ballots(&self, voting: VotingId) -> anyhow::Result<Vec<Ballot>> {
        self.send(self.request(Method::GET, &format!("/store/{}", voting)))
    }
}

/// The server answers either `{"error", "message"}` or a bare JSON string
fn error_message(body: &str) -> String {
    match serde_json::from_str::<Value>(body) {
        Ok(Value::String(message)) => message,
        Ok(Value::Object(obj)) => match obj.get("message").and_then(Value::as_str) {
            Some(message) => message.to_owned(),
            None => body.to_owned(),
        },
        _ => body.trim().to_owned(),
    }
}
