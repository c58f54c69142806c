use crate::guards::Caller;
use decide::*;
use rocket::http::Status;
use rocket::response::status::Created;
use rocket::response::{self, Responder, Response};
use rocket::serde::json::Json;
use rocket::{Catcher, Request, Route, State};
use tracing::{error, warn};

/// Any library error, as an HTTP response
#[derive(Debug)]
pub struct ApiError(pub Error);

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    message: String,
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        ApiError(e)
    }
}

impl ApiError {
    pub fn status(&self) -> Status {
        match self.0 {
            Error::Unauthorized => Status::Unauthorized,
            Error::Forbidden => Status::Forbidden,
            Error::VotingNotFound(_) => Status::NotFound,
            Error::InvalidAction(_)
            | Error::InvalidStateTransition(_)
            | Error::InvalidVoting(_)
            | Error::MalformedBallot(_)
            | Error::MissingPublicKey(_) => Status::BadRequest,
            Error::Ineligible { .. } | Error::VotingNotOpen(_) => Status::Unauthorized,
            Error::DuplicateBallot { .. } => Status::Conflict,
            Error::AuthorityUnavailable(_) => Status::ServiceUnavailable,
            Error::MalformedTallyResult(_) => Status::BadGateway,
            Error::Store(_) => Status::InternalServerError,
        }
    }
}

impl<'r> Responder<'r, 'static> for ApiError {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'static> {
        let status = self.status();
        if status.code >= 500 {
            error!(error = %self.0, uri = %req.uri(), "request failed");
        }

        let body = Json(ErrorBody {
            error: self.0.kind().to_owned(),
            message: self.0.to_string(),
        });
        Response::build_from(body.respond_to(req)?)
            .status(status)
            .ok()
    }
}

#[post("/voting", data = "<request>")]
async fn create_voting(
    decide: &State<Decide>,
    default_authority: &State<AuthorityRef>,
    caller: Caller,
    request: Json<VotingRequest>,
) -> ApiResult<Created<Json<Voting>>> {
    // Permission is checked before the payload
    caller.0.require_admin()?;
    let new_voting = request.into_inner().into_new_voting(default_authority)?;

    let voting = decide.create_voting(&caller.0, new_voting).await?;
    Ok(Created::new(format!("/voting/{}", voting.id)).body(Json(voting)))
}

#[get("/voting")]
async fn list_votings(decide: &State<Decide>, caller: Option<Caller>) -> ApiResult<Json<Vec<Voting>>> {
    let caller = caller.map(|c| c.0);
    Ok(Json(decide.list_votings(caller.as_ref()).await?))
}

#[get("/voting/<id>")]
async fn get_voting(decide: &State<Decide>, id: VotingId) -> ApiResult<Json<Voting>> {
    Ok(Json(decide.get_voting(id).await?))
}

#[derive(Deserialize)]
struct ActionRequest {
    action: Option<String>,
}

/// Lifecycle actions answer with a bare JSON string, on success and on failure alike
#[put("/voting/<id>", data = "<request>")]
async fn update_voting(
    decide: &State<Decide>,
    caller: Caller,
    id: VotingId,
    request: Json<ActionRequest>,
) -> Result<Json<&'static str>, (Status, Json<String>)> {
    let action = request.into_inner().action.unwrap_or_default();

    // Non-admins are turned away before the action is even looked at
    let outcome = match caller.0.require_admin().and_then(|_| action.parse::<Action>()) {
        Ok(action) => decide.apply_action(&caller.0, id, action).await,
        Err(e) => Err(e),
    };

    outcome.map(Json).map_err(|e| {
        let e = ApiError(e);
        if e.status().code >= 500 {
            warn!(voting = id, error = %e.0, "lifecycle action failed");
        }
        (e.status(), Json(e.0.to_string()))
    })
}

#[post("/store", data = "<submission>")]
async fn submit_ballot(
    decide: &State<Decide>,
    caller: Caller,
    submission: Json<BallotSubmission>,
) -> ApiResult<Json<BallotSubmission>> {
    let submission = submission.into_inner();
    decide.submit_ballot(&caller.0, submission.clone()).await?;
    Ok(Json(submission))
}

#[get("/store/<voting>")]
async fn list_ballots(
    decide: &State<Decide>,
    caller: Caller,
    voting: VotingId,
) -> ApiResult<Json<Vec<Ballot>>> {
    Ok(Json(decide.ballots(&caller.0, voting).await?))
}

#[derive(Deserialize)]
struct CensusRequest {
    voting_id: VotingId,
    voters: Vec<VoterId>,
}

#[derive(Serialize)]
struct CensusAdded {
    added: usize,
}

#[derive(Serialize)]
struct CensusRemoved {
    removed: usize,
}

#[post("/census", data = "<request>")]
async fn add_census(
    decide: &State<Decide>,
    caller: Caller,
    request: Json<CensusRequest>,
) -> ApiResult<(Status, Json<CensusAdded>)> {
    let added = decide
        .add_census(&caller.0, request.voting_id, &request.voters)
        .await?;
    Ok((Status::Created, Json(CensusAdded { added })))
}

#[delete("/census", data = "<request>")]
async fn remove_census(
    decide: &State<Decide>,
    caller: Caller,
    request: Json<CensusRequest>,
) -> ApiResult<Json<CensusRemoved>> {
    let removed = decide
        .remove_census(&caller.0, request.voting_id, &request.voters)
        .await?;
    Ok(Json(CensusRemoved { removed }))
}

#[get("/census/<voting>?<voter_id>")]
async fn check_census(
    decide: &State<Decide>,
    voting: VotingId,
    voter_id: VoterId,
) -> Result<Json<&'static str>, (Status, Json<&'static str>)> {
    match decide.check_census(voting, voter_id).await {
        Ok(true) => Ok(Json("Valid voter")),
        Ok(false) => Err((Status::Unauthorized, Json("Invalid voter"))),
        Err(e) => {
            let e = ApiError(e);
            error!(voting, error = %e.0, "census check failed");
            Err((e.status(), Json("Census unavailable")))
        }
    }
}

#[catch(default)]
fn default_catcher(status: Status, _req: &Request) -> (Status, Json<ErrorBody>) {
    let error = match status.code {
        401 => "unauthorized".to_owned(),
        403 => "forbidden".to_owned(),
        404 => "not_found".to_owned(),
        _ => status.reason_lossy().to_lowercase().replace(' ', "_"),
    };
    let body = ErrorBody {
        error,
        message: status.reason_lossy().to_owned(),
    };
    (status, Json(body))
}

pub fn routes() -> Vec<Route> {
    routes![
        create_voting,
        list_votings,
        get_voting,
        update_voting,
        submit_ballot,
        list_ballots,
        add_census,
        remove_census,
        check_census
    ]
}

pub fn catchers() -> Vec<Catcher> {
    catchers![default_catcher]
}
