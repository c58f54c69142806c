use super::*;
use decide::test_util::LocalAuthority;
use decide::*;
use rocket::http::{ContentType, Header, Status};
use rocket::local::blocking::{Client, LocalResponse};
use serde_json::{json, Value};

const ADMIN: &str = "admin-token";
const VOTER: &str = "voter-token";
const OTHER: &str = "other-token";

fn client() -> (Client, Arc<LocalAuthority>) {
    let authority = Arc::new(LocalAuthority::new());
    let decide = Decide::new(Arc::new(MemStore::new()), authority.clone());
    let users = Users::default()
        .with(ADMIN, Identity::admin(1, "admin"))
        .with(VOTER, Identity::new(2, "voter"))
        .with(OTHER, Identity::new(3, "other"));
    let default_authority = AuthorityRef {
        name: "local".into(),
        url: "http://localhost:8000".into(),
        me: true,
    };

    let client = Client::tracked(server(decide, users, default_authority)).unwrap();
    (client, authority)
}

fn token(t: &str) -> Header<'static> {
    Header::new("Authorization", format!("Token {}", t))
}

fn body(response: LocalResponse) -> Value {
    response.into_json().unwrap()
}

fn create_voting(client: &Client) -> u64 {
    let response = client
        .post("/voting")
        .header(ContentType::JSON)
        .header(token(ADMIN))
        .body(
            json!({
                "name": "Example voting",
                "desc": "Description example",
                "question": "I want a ",
                "question_opt": ["cat", "dog", "horse"]
            })
            .to_string(),
        )
        .dispatch();
    assert_eq!(response.status(), Status::Created);
    body(response)["id"].as_u64().unwrap()
}

fn action(client: &Client, id: u64, t: &str, action: &str) -> (Status, String) {
    let response = client
        .put(format!("/voting/{}", id))
        .header(ContentType::JSON)
        .header(token(t))
        .body(json!({ "action": action }).to_string())
        .dispatch();
    let status = response.status();
    (status, response.into_json::<String>().unwrap())
}

fn add_census(client: &Client, id: u64, voters: &[u64]) {
    let response = client
        .post("/census")
        .header(ContentType::JSON)
        .header(token(ADMIN))
        .body(json!({ "voting_id": id, "voters": voters }).to_string())
        .dispatch();
    assert_eq!(response.status(), Status::Created);
}

fn vote(client: &Client, t: &str, id: u64, voter: u64, option: u64) -> Status {
    let voting: Voting = client.get(format!("/voting/{}", id)).dispatch().into_json().unwrap();
    let key = voting.pub_key.unwrap();
    let vote = key.encrypt(option, &mut rand::thread_rng());
    let (a, b) = vote.to_decimal();

    client
        .post("/store")
        .header(ContentType::JSON)
        .header(token(t))
        .body(json!({ "voting": id, "voter": voter, "vote": { "a": a, "b": b } }).to_string())
        .dispatch()
        .status()
}

#[test]
fn create_voting_permissions() {
    let (client, _) = client();
    let payload = json!({
        "name": "Example voting",
        "desc": "Description example",
        "question": "I want a ",
        "question_opt": ["cat", "dog", "horse"]
    })
    .to_string();

    let response = client
        .post("/voting")
        .header(ContentType::JSON)
        .body(&payload)
        .dispatch();
    assert_eq!(response.status(), Status::Unauthorized);

    let response = client
        .post("/voting")
        .header(ContentType::JSON)
        .header(token(VOTER))
        .body(&payload)
        .dispatch();
    assert_eq!(response.status(), Status::Forbidden);
    assert_eq!(body(response)["error"], "forbidden");

    let response = client
        .post("/voting")
        .header(ContentType::JSON)
        .header(token(ADMIN))
        .body(json!({ "name": "Missing question" }).to_string())
        .dispatch();
    assert_eq!(response.status(), Status::BadRequest);
    assert_eq!(body(response)["error"], "invalid_voting");

    let response = client
        .post("/voting")
        .header(ContentType::JSON)
        .header(token(ADMIN))
        .body(&payload)
        .dispatch();
    assert_eq!(response.status(), Status::Created);
    let voting = body(response);
    assert_eq!(voting["status"], "not_started");
    assert_eq!(voting["question"]["options"][2]["number"], 3);
    assert_eq!(voting["auths"][0]["name"], "local");
}

#[test]
fn update_voting_messages() {
    let (client, _) = client();
    let id = create_voting(&client);

    assert_eq!(
        action(&client, id, VOTER, "start"),
        (Status::Forbidden, "decide: administrator privileges required".to_owned())
    );
    assert_eq!(
        action(&client, id, VOTER, "bad"),
        (Status::Forbidden, "decide: administrator privileges required".to_owned())
    );
    assert_eq!(
        action(&client, id, VOTER, ""),
        (Status::Forbidden, "decide: administrator privileges required".to_owned())
    );
    assert_eq!(
        action(&client, id, ADMIN, "bad"),
        (
            Status::BadRequest,
            "Action not found, try with start, stop or tally".to_owned()
        )
    );

    let steps = [
        ("stop", Status::BadRequest, "Voting is not started"),
        ("tally", Status::BadRequest, "Voting is not started"),
        ("start", Status::Ok, "Voting started"),
        ("start", Status::BadRequest, "Voting already started"),
        ("tally", Status::BadRequest, "Voting is not stopped"),
        ("stop", Status::Ok, "Voting stopped"),
        ("start", Status::BadRequest, "Voting already started"),
        ("stop", Status::BadRequest, "Voting already stopped"),
        ("tally", Status::Ok, "Voting tallied"),
        ("start", Status::BadRequest, "Voting already started"),
        ("stop", Status::BadRequest, "Voting already stopped"),
        ("tally", Status::BadRequest, "Voting already tallied"),
    ];
    for (name, status, message) in steps.iter() {
        assert_eq!(action(&client, id, ADMIN, name), (*status, message.to_string()));
    }

    let (status, _) = action(&client, 999, ADMIN, "start");
    assert_eq!(status, Status::NotFound);
}

#[test]
fn full_voting() {
    let (client, _) = client();
    let id = create_voting(&client);
    add_census(&client, id, &[2, 3]);

    let response = client.get(format!("/census/{}?voter_id=2", id)).dispatch();
    assert_eq!(response.status(), Status::Ok);
    assert_eq!(response.into_json::<String>().unwrap(), "Valid voter");
    let response = client.get(format!("/census/{}?voter_id=4", id)).dispatch();
    assert_eq!(response.status(), Status::Unauthorized);
    assert_eq!(response.into_json::<String>().unwrap(), "Invalid voter");

    assert_eq!(action(&client, id, ADMIN, "start").0, Status::Ok);

    assert_eq!(vote(&client, VOTER, id, 2, 1), Status::Ok);
    assert_eq!(vote(&client, VOTER, id, 2, 2), Status::Conflict);
    // Casting for someone else
    assert_eq!(vote(&client, VOTER, id, 3, 2), Status::Forbidden);
    assert_eq!(vote(&client, OTHER, id, 3, 3), Status::Ok);

    let response = client.get(format!("/store/{}", id)).header(token(VOTER)).dispatch();
    assert_eq!(response.status(), Status::Forbidden);
    let response = client.get(format!("/store/{}", id)).header(token(ADMIN)).dispatch();
    assert_eq!(body(response).as_array().unwrap().len(), 2);

    assert_eq!(action(&client, id, ADMIN, "stop").0, Status::Ok);
    assert_eq!(vote(&client, OTHER, id, 3, 1), Status::Unauthorized);
    assert_eq!(action(&client, id, ADMIN, "tally").0, Status::Ok);

    let voting: Voting = client.get(format!("/voting/{}", id)).dispatch().into_json().unwrap();
    assert_eq!(voting.status, VotingStatus::Tallied);
    let votes: Vec<(String, u64)> = voting
        .postproc
        .unwrap()
        .into_iter()
        .map(|r| (r.option, r.votes))
        .collect();
    assert_eq!(
        votes,
        vec![
            ("cat".to_owned(), 1),
            ("dog".to_owned(), 0),
            ("horse".to_owned(), 1)
        ]
    );
}

#[test]
fn ineligible_voter() {
    let (client, _) = client();
    let id = create_voting(&client);
    add_census(&client, id, &[2]);
    action(&client, id, ADMIN, "start");

    assert_eq!(vote(&client, OTHER, id, 3, 1), Status::Unauthorized);

    let response = client.get(format!("/store/{}", id)).header(token(ADMIN)).dispatch();
    assert!(body(response).as_array().unwrap().is_empty());
}

#[test]
fn authority_failure_keeps_voting_stopped() {
    let (client, authority) = client();
    let id = create_voting(&client);
    add_census(&client, id, &[2]);
    action(&client, id, ADMIN, "start");
    assert_eq!(vote(&client, VOTER, id, 2, 2), Status::Ok);
    action(&client, id, ADMIN, "stop");

    authority.set_failing(true);
    let (status, _) = action(&client, id, ADMIN, "tally");
    assert_eq!(status, Status::ServiceUnavailable);
    let voting: Voting = client.get(format!("/voting/{}", id)).dispatch().into_json().unwrap();
    assert_eq!(voting.status, VotingStatus::Stopped);

    authority.set_failing(false);
    authority.inject_selections(vec![7]);
    let (status, _) = action(&client, id, ADMIN, "tally");
    assert_eq!(status, Status::BadGateway);

    assert_eq!(
        action(&client, id, ADMIN, "tally"),
        (Status::Ok, "Voting tallied".to_owned())
    );
}

#[test]
fn private_votings_are_hidden() {
    let (client, _) = client();
    create_voting(&client);

    let response = client.get("/voting").dispatch();
    assert!(body(response).as_array().unwrap().is_empty());
    let response = client.get("/voting").header(token(ADMIN)).dispatch();
    assert_eq!(body(response).as_array().unwrap().len(), 1);

    let response = client.get("/voting/42").dispatch();
    assert_eq!(response.status(), Status::NotFound);
    assert_eq!(body(response)["error"], "voting_not_found");
}
