use crate::*;
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;

/// The external tally authority (mixnet)
///
/// Key generation, shuffling and decryption all happen on the other side of this trait.
#[async_trait]
pub trait Authority: Send + Sync {
    /// Have the voting's authorities generate a public key for it
    async fn generate_key(&self, voting: &Voting) -> Result<PublicKey, Error>;

    /// Shuffle and decrypt a batch of ballots.
    ///
    /// Returns one cleartext option number per ballot, in no particular order.
    async fn decrypt(
        &self,
        voting: &Voting,
        key: &PublicKey,
        ballots: Vec<Ciphertext>,
    ) -> Result<Vec<u64>, Error>;
}

/// Talks to mixnet authorities over HTTP
///
/// - `POST {url}/mixnet/` generates a key
/// - `POST {url}/mixnet/shuffle/{voting}/` shuffles a batch
/// - `POST {url}/mixnet/decrypt/{voting}/` decrypts a shuffled batch
pub struct HttpAuthority {
    client: reqwest::Client,
    token: Option<String>,
}

#[derive(Serialize)]
struct KeyRequest<'a> {
    voting: VotingId,
    auths: Vec<AuthEntry<'a>>,
}

#[derive(Serialize)]
struct AuthEntry<'a> {
    name: &'a str,
    url: &'a str,
}

#[derive(Serialize)]
struct MixRequest<'a> {
    msgs: Vec<CiphertextPair>,
    pk: &'a PublicKey,
}

impl HttpAuthority {
    pub fn new(timeout: Duration, token: Option<String>) -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .user_agent("decide")
            .timeout(timeout)
            .build()
            .map_err(|e| Error::AuthorityUnavailable(e.to_string()))?;

        Ok(HttpAuthority { client, token })
    }

    fn base_url(voting: &Voting) -> Result<String, Error> {
        let auth = voting.primary_authority().ok_or_else(|| {
            Error::AuthorityUnavailable(format!("voting {} has no authorities", voting.id))
        })?;
        Ok(auth.url.trim_end_matches('/').to_owned())
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<T, Error> {
        let mut request = self.client.post(url).json(body);
        if let Some(token) = &self.token {
            request = request.header("Authorization", format!("Token {}", token));
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::AuthorityUnavailable(format!("{}: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::AuthorityUnavailable(format!(
                "{} answered {}",
                url, status
            )));
        }

        response.json::<T>().await.map_err(|e| {
            if e.is_decode() {
                Error::MalformedTallyResult(format!("{}: {}", url, e))
            } else {
                Error::AuthorityUnavailable(format!("{}: {}", url, e))
            }
        })
    }
}

#[async_trait]
impl Authority for HttpAuthority {
    async fn generate_key(&self, voting: &Voting) -> Result<PublicKey, Error> {
        let url = format!("{}/mixnet/", Self::base_url(voting)?);
        let body = KeyRequest {
            voting: voting.id,
            auths: voting
                .auths
                .iter()
                .map(|a| AuthEntry {
                    name: &a.name,
                    url: &a.url,
                })
                .collect(),
        };

        let key: PublicKey = self.post(&url, &body).await?;
        key.validate()?;
        Ok(key)
    }

    async fn decrypt(
        &self,
        voting: &Voting,
        key: &PublicKey,
        ballots: Vec<Ciphertext>,
    ) -> Result<Vec<u64>, Error> {
        let base = Self::base_url(voting)?;

        let shuffle_url = format!("{}/mixnet/shuffle/{}/", base, voting.id);
        let body = MixRequest {
            msgs: ballots.into_iter().map(CiphertextPair::from).collect(),
            pk: key,
        };
        let shuffled: Vec<CiphertextPair> = self.post(&shuffle_url, &body).await?;

        let decrypt_url = format!("{}/mixnet/decrypt/{}/", base, voting.id);
        let body = MixRequest {
            msgs: shuffled,
            pk: key,
        };
        self.post(&decrypt_url, &body).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::BigUint;
    use serde_json::json;
    use wiremock::matchers::{body_json, body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn voting_at(url: String) -> Voting {
        let mut question = Question::new("Pick one");
        question.add_option("a", false, false);
        question.add_option("b", false, false);
        let auths = vec![AuthorityRef {
            name: "mixnet".into(),
            url,
            me: true,
        }];
        NewVoting::new("remote", question, auths).into_voting(1)
    }

    fn authority() -> HttpAuthority {
        HttpAuthority::new(Duration::from_secs(5), Some("secret".into())).unwrap()
    }

    fn key() -> PublicKey {
        PublicKey {
            p: BigUint::from(23u32),
            g: BigUint::from(5u32),
            y: BigUint::from(8u32),
        }
    }

    #[tokio::test]
    async fn generate_key_posts_the_authority_list() {
        let server = MockServer::start().await;
        // A trailing slash on the stored url must not double up
        let url = format!("{}/", server.uri());

        Mock::given(method("POST"))
            .and(path("/mixnet/"))
            .and(header("Authorization", "Token secret"))
            .and(body_json(json!({
                "voting": 1,
                "auths": [{"name": "mixnet", "url": url}],
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"p": "23", "g": 5, "y": "8"})))
            .expect(1)
            .mount(&server)
            .await;

        let key = authority().generate_key(&voting_at(url)).await.unwrap();
        assert_eq!(key, self::key());
    }

    #[tokio::test]
    async fn generate_key_rejects_an_out_of_range_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/mixnet/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"p": "23", "g": "5", "y": "23"})))
            .mount(&server)
            .await;

        let result = authority().generate_key(&voting_at(server.uri())).await;
        assert!(matches!(result, Err(Error::MalformedTallyResult(_))));
    }

    #[tokio::test]
    async fn decrypt_shuffles_then_decrypts() {
        let server = MockServer::start().await;
        let pk = json!({"p": "23", "g": "5", "y": "8"});

        Mock::given(method("POST"))
            .and(path("/mixnet/shuffle/1/"))
            .and(header("Authorization", "Token secret"))
            .and(body_json(json!({"msgs": [["3", "7"]], "pk": pk})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([["4", "9"]])))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/mixnet/decrypt/1/"))
            .and(body_partial_json(json!({"msgs": [["4", "9"]]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([2])))
            .expect(1)
            .mount(&server)
            .await;

        let ballot = Ciphertext {
            a: BigUint::from(3u32),
            b: BigUint::from(7u32),
        };
        let clear = authority()
            .decrypt(&voting_at(server.uri()), &key(), vec![ballot])
            .await
            .unwrap();
        assert_eq!(clear, vec![2]);
    }

    #[tokio::test]
    async fn error_status_means_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let result = authority().generate_key(&voting_at(server.uri())).await;
        assert!(matches!(result, Err(Error::AuthorityUnavailable(_))));
    }

    #[tokio::test]
    async fn unparseable_answer_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/mixnet/decrypt/1/"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/mixnet/shuffle/1/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([["4", "9"]])))
            .mount(&server)
            .await;

        let ballot = Ciphertext {
            a: BigUint::from(3u32),
            b: BigUint::from(7u32),
        };
        let result = authority()
            .decrypt(&voting_at(server.uri()), &key(), vec![ballot])
            .await;
        assert!(matches!(result, Err(Error::MalformedTallyResult(_))));
    }

    #[tokio::test]
    async fn unreachable_authority_is_unavailable() {
        let result = authority()
            .generate_key(&voting_at("http://127.0.0.1:1".into()))
            .await;
        assert!(matches!(result, Err(Error::AuthorityUnavailable(_))));
    }
}
