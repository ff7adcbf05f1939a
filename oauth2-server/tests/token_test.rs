mod common;

use axum::http::StatusCode;
use chrono::{Duration, Utc};
use common::*;
use oauth2_server::params::Operation;
use oauth2_server::{Grant, GrantStore, OAuthErrorCode, TokenStore};

/// Persist a grant created `age_ms` milliseconds ago and return its reference.
async fn saved_grant(app: &TestApp, age_ms: i64, redirect_uri: &str, client_id: &str) -> String {
    let grant = Grant {
        id: format!("grant{}", age_ms),
        client_id: client_id.to_string(),
        user_id: Some(app.user.id.clone()),
        code: "somecode".to_string(),
        redirect_uri: redirect_uri.to_string(),
        created_at: Utc::now() - Duration::milliseconds(age_ms),
    };
    let reference = format!("{}.{}", grant.id, grant.code);
    app.store.create_grant(grant.clone()).await.unwrap();

    // A second, independent lookup must see the fresh grant.
    assert_eq!(app.store.get_grant(&grant.id).await.unwrap(), Some(grant));
    reference
}

fn exchange_form<'a>(code: &'a str, secret: Option<&'a str>, redirect_uri: &'a str) -> Vec<(&'a str, &'a str)> {
    let mut form = vec![
        ("grant_type", "authorization_code"),
        ("client_id", CLIENT_ID),
        ("code", code),
        ("redirect_uri", redirect_uri),
    ];
    if let Some(secret) = secret {
        form.push(("client_secret", secret));
    }
    form
}

#[tokio::test]
async fn token_without_parameters_is_invalid_request() {
    let app = TestApp::new().await;
    let response = app.send(TestRequest::post(TOKEN_URL).form(&[])).await;
    response.assert_oauth_error(OAuthErrorCode::InvalidRequest);
}

#[tokio::test]
async fn token_missing_any_mandatory_param_is_invalid_request() {
    let app = TestApp::new().await;
    let full = exchange_form("some code", Some(CLIENT_SECRET), REDIRECT_URI);
    for missing in Operation::Token.mandatory() {
        let partial: Vec<(&str, &str)> = full
            .iter()
            .copied()
            .filter(|(name, _)| name != missing)
            .collect();
        let response = app.send(TestRequest::post(TOKEN_URL).form(&partial)).await;
        response.assert_oauth_error(OAuthErrorCode::InvalidRequest);
    }
}

#[tokio::test]
async fn token_bad_grant_type_is_unsupported() {
    let app = TestApp::new().await;
    for grant_type in ["password", "assertion", "refresh_token", "none"] {
        let response = app
            .send(TestRequest::post(TOKEN_URL).form(&[
                ("grant_type", grant_type),
                ("client_id", CLIENT_ID),
                ("code", "some code"),
                ("redirect_uri", REDIRECT_URI),
            ]))
            .await;
        response.assert_oauth_error(OAuthErrorCode::UnsupportedGrantType);
    }
}

#[tokio::test]
async fn token_without_client_secret_is_invalid_request() {
    let app = TestApp::new().await;
    let response = app
        .send(TestRequest::post(TOKEN_URL).form(&exchange_form("some code", None, REDIRECT_URI)))
        .await;
    response.assert_oauth_error(OAuthErrorCode::InvalidRequest);
}

#[tokio::test]
async fn token_with_two_client_secrets_is_invalid_request() {
    let app = TestApp::new().await;
    let response = app
        .send(
            TestRequest::post(TOKEN_URL)
                .form(&exchange_form("some code", Some("somesecret"), REDIRECT_URI))
                .header("authorization", "Basic somesecret"),
        )
        .await;
    response.assert_oauth_error(OAuthErrorCode::InvalidRequest);
}

#[tokio::test]
async fn token_unknown_client_is_invalid_client() {
    let app = TestApp::new().await;
    let response = app
        .send(TestRequest::post(TOKEN_URL).form(&[
            ("grant_type", "authorization_code"),
            ("client_id", "toto"),
            ("code", "some code"),
            ("client_secret", "some secret"),
            ("redirect_uri", REDIRECT_URI),
        ]))
        .await;
    response.assert_oauth_error(OAuthErrorCode::InvalidClient);
}

#[tokio::test]
async fn token_bad_secret_in_param_is_invalid_client() {
    let app = TestApp::new().await;
    let response = app
        .send(TestRequest::post(TOKEN_URL).form(&exchange_form(
            "some code",
            Some("some secret"),
            REDIRECT_URI,
        )))
        .await;
    response.assert_oauth_error(OAuthErrorCode::InvalidClient);
}

#[tokio::test]
async fn token_bad_secret_in_header_is_invalid_client() {
    let app = TestApp::new().await;
    let response = app
        .send(
            TestRequest::post(TOKEN_URL)
                .form(&exchange_form("some code", None, REDIRECT_URI))
                .header("authorization", "Basic some secret"),
        )
        .await;
    response.assert_oauth_error(OAuthErrorCode::InvalidClient);
}

#[tokio::test]
async fn token_unknown_grant_is_invalid_grant_whichever_secret_channel() {
    let app = TestApp::new().await;
    let response = app
        .send(TestRequest::post(TOKEN_URL).form(&exchange_form(
            "some code",
            Some(CLIENT_SECRET),
            REDIRECT_URI,
        )))
        .await;
    response.assert_oauth_error(OAuthErrorCode::InvalidGrant);

    let response = app
        .send(
            TestRequest::post(TOKEN_URL)
                .form(&exchange_form("some code", None, REDIRECT_URI))
                .header("authorization", &format!("Basic {}", CLIENT_SECRET)),
        )
        .await;
    response.assert_oauth_error(OAuthErrorCode::InvalidGrant);

    let response = app
        .send(TestRequest::post(TOKEN_URL).form(&exchange_form(
            "unknown.somecode",
            Some(CLIENT_SECRET),
            REDIRECT_URI,
        )))
        .await;
    response.assert_oauth_error(OAuthErrorCode::InvalidGrant);
}

#[tokio::test]
async fn token_outdated_grant_is_invalid_grant() {
    let app = TestApp::new().await;
    let reference = saved_grant(&app, 60_100, REDIRECT_URI, CLIENT_ID).await;
    let response = app
        .send(TestRequest::post(TOKEN_URL).form(&exchange_form(
            &reference,
            Some(CLIENT_SECRET),
            REDIRECT_URI,
        )))
        .await;
    response.assert_oauth_error(OAuthErrorCode::InvalidGrant);
}

#[tokio::test]
async fn token_code_without_verifier_is_invalid_grant() {
    let app = TestApp::new().await;
    let reference = saved_grant(&app, 15_000, REDIRECT_URI, CLIENT_ID).await;
    let grant_id = reference.split('.').next().unwrap();
    let response = app
        .send(TestRequest::post(TOKEN_URL).form(&exchange_form(
            grant_id,
            Some(CLIENT_SECRET),
            REDIRECT_URI,
        )))
        .await;
    response.assert_oauth_error(OAuthErrorCode::InvalidGrant);
}

#[tokio::test]
async fn token_wrong_verifier_is_invalid_grant() {
    let app = TestApp::new().await;
    let reference = saved_grant(&app, 15_000, REDIRECT_URI, CLIENT_ID).await;
    let forged = format!("{}.othercode", reference.split('.').next().unwrap());
    let response = app
        .send(TestRequest::post(TOKEN_URL).form(&exchange_form(
            &forged,
            Some(CLIENT_SECRET),
            REDIRECT_URI,
        )))
        .await;
    response.assert_oauth_error(OAuthErrorCode::InvalidGrant);
}

#[tokio::test]
async fn token_redirect_uri_must_match_the_authorization_request() {
    let app = TestApp::new().await;
    // The grant remembers the URI used at authorization time, even though
    // the registered one is what the token request presents.
    let reference = saved_grant(&app, 15_000, "http://127.0.0.1:8888/other", CLIENT_ID).await;
    let response = app
        .send(TestRequest::post(TOKEN_URL).form(&exchange_form(
            &reference,
            Some(CLIENT_SECRET),
            REDIRECT_URI,
        )))
        .await;
    response.assert_oauth_error(OAuthErrorCode::InvalidGrant);

    let reference = saved_grant(&app, 14_000, REDIRECT_URI, CLIENT_ID).await;
    let response = app
        .send(TestRequest::post(TOKEN_URL).form(&exchange_form(
            &reference,
            Some(CLIENT_SECRET),
            "http://127.0.0.1:8888/toto",
        )))
        .await;
    response.assert_oauth_error(OAuthErrorCode::InvalidGrant);
}

#[tokio::test]
async fn token_grant_of_another_client_is_invalid_grant() {
    let app = TestApp::new().await;
    let reference = saved_grant(&app, 15_000, REDIRECT_URI, "someone-else").await;
    let response = app
        .send(TestRequest::post(TOKEN_URL).form(&exchange_form(
            &reference,
            Some(CLIENT_SECRET),
            REDIRECT_URI,
        )))
        .await;
    response.assert_oauth_error(OAuthErrorCode::InvalidGrant);
}

#[tokio::test]
async fn token_ok_with_secret_in_params() {
    let app = TestApp::new().await;
    let reference = saved_grant(&app, 15_000, REDIRECT_URI, CLIENT_ID).await;
    let response = app
        .send(TestRequest::post(TOKEN_URL).form(&exchange_form(
            &reference,
            Some(CLIENT_SECRET),
            REDIRECT_URI,
        )))
        .await;

    assert_eq!(response.status, StatusCode::OK, "body: {}", response.text());
    assert_eq!(response.header("cache-control"), Some("no-store"));
    let access_token = response.json()["access_token"]
        .as_str()
        .unwrap()
        .to_string();
    assert!(!access_token.is_empty());

    let record = app
        .store
        .find_access_token(&access_token)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.user_id, app.user.id);
    assert_eq!(record.client_id, CLIENT_ID);
}

#[tokio::test]
async fn token_ok_with_secret_in_header() {
    let app = TestApp::new().await;
    let reference = saved_grant(&app, 15_000, REDIRECT_URI, CLIENT_ID).await;
    let response = app
        .send(
            TestRequest::post(TOKEN_URL)
                .form(&exchange_form(&reference, None, REDIRECT_URI))
                .header("authorization", &format!("Basic {}", CLIENT_SECRET)),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK, "body: {}", response.text());
    assert!(response.json()["access_token"].as_str().is_some());
}

#[tokio::test]
async fn token_accepts_json_body() {
    let app = TestApp::new().await;
    let reference = saved_grant(&app, 15_000, REDIRECT_URI, CLIENT_ID).await;
    let response = app
        .send(TestRequest::post(TOKEN_URL).json(&serde_json::json!({
            "grant_type": "authorization_code",
            "client_id": CLIENT_ID,
            "client_secret": CLIENT_SECRET,
            "code": reference,
            "redirect_uri": REDIRECT_URI,
        })))
        .await;
    assert_eq!(response.status, StatusCode::OK, "body: {}", response.text());
}

#[tokio::test]
async fn grant_is_single_use() {
    let app = TestApp::new().await;
    let reference = saved_grant(&app, 15_000, REDIRECT_URI, CLIENT_ID).await;
    let form = exchange_form(&reference, Some(CLIENT_SECRET), REDIRECT_URI);

    let first = app.send(TestRequest::post(TOKEN_URL).form(&form)).await;
    assert_eq!(first.status, StatusCode::OK);

    let second = app.send(TestRequest::post(TOKEN_URL).form(&form)).await;
    second.assert_oauth_error(OAuthErrorCode::InvalidGrant);
}

#[tokio::test]
async fn failed_exchange_leaves_the_grant_usable() {
    let app = TestApp::new().await;
    let reference = saved_grant(&app, 15_000, REDIRECT_URI, CLIENT_ID).await;

    let rejected = app
        .send(TestRequest::post(TOKEN_URL).form(&exchange_form(
            &reference,
            Some(CLIENT_SECRET),
            "http://127.0.0.1:8888/toto",
        )))
        .await;
    rejected.assert_oauth_error(OAuthErrorCode::InvalidGrant);

    let accepted = app
        .send(TestRequest::post(TOKEN_URL).form(&exchange_form(
            &reference,
            Some(CLIENT_SECRET),
            REDIRECT_URI,
        )))
        .await;
    assert_eq!(accepted.status, StatusCode::OK);
}

#[tokio::test]
async fn concurrent_exchanges_yield_one_token() {
    let app = TestApp::new().await;
    let reference = saved_grant(&app, 15_000, REDIRECT_URI, CLIENT_ID).await;
    let form = exchange_form(&reference, Some(CLIENT_SECRET), REDIRECT_URI);

    let (a, b) = tokio::join!(
        app.send(TestRequest::post(TOKEN_URL).form(&form)),
        app.send(TestRequest::post(TOKEN_URL).form(&form)),
    );
    let mut statuses = [a.status, b.status];
    statuses.sort();
    assert_eq!(statuses, [StatusCode::OK, StatusCode::BAD_REQUEST]);
}

#[tokio::test]
async fn full_authorization_code_flow() {
    let app = TestApp::new().await;
    let info = oauth2_server::authorize::AuthorizationRequest {
        client_id: CLIENT_ID.to_string(),
        response_type: "code".to_string(),
        redirect_uri: REDIRECT_URI.to_string(),
        state: Some("xyz".to_string()),
    }
    .encode_info()
    .unwrap();

    let login = app
        .send(TestRequest::post(LOGIN_URL).form(&[
            ("email", EMAIL),
            ("password", PASSWORD),
            ("info", info.as_str()),
        ]))
        .await;
    assert_eq!(login.status, StatusCode::SEE_OTHER);
    let location = url::Url::parse(login.header("location").unwrap()).unwrap();
    let code = location
        .query_pairs()
        .find(|(k, _)| k == "code")
        .map(|(_, v)| v.into_owned())
        .unwrap();

    let token = app
        .send(TestRequest::post(TOKEN_URL).form(&exchange_form(
            &code,
            Some(CLIENT_SECRET),
            REDIRECT_URI,
        )))
        .await;
    assert_eq!(token.status, StatusCode::OK);
    let access_token = token.json()["access_token"].as_str().unwrap().to_string();

    let me = app
        .send(TestRequest::get_with(
            &format!("{}/@me/@self", CONTACTS_URL),
            &[("oauth_token", access_token.as_str())],
        ))
        .await;
    assert_eq!(me.status, StatusCode::OK);
    assert_eq!(me.json()["entry"]["displayName"], "pruyssen");
}
