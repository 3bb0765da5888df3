use actix_web::{http::StatusCode, web, web::ServiceConfig, HttpResponse};
use chrono::{Days, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use marketplace_engine::db_types::ActorRole;

use super::helpers::*;
use crate::{
    auth::{JwtClaims, TokenValidator},
    config::AuthConfig,
    errors::AuthError,
};

#[actix_web::test]
async fn valid_tokens_reach_the_handler() {
    let _ = env_logger::try_init().ok();
    let (status, body) = get_request(&customer_token(), "/secure/whoami", configure).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "1");
}

#[actix_web::test]
async fn expired_tokens_are_rejected() {
    let _ = env_logger::try_init().ok();
    let claims = JwtClaims::new(CUSTOMER_ID, vec![ActorRole::Customer], Utc::now() - Days::new(1));
    let token = format!("Bearer {}", issue_token(claims));
    let err = get_request(&token, "/secure/whoami", configure).await.expect_err("Expired token was accepted");
    assert!(err.starts_with("Authentication Error. Access token is invalid."), "{err}");
}

#[actix_web::test]
async fn tokens_signed_with_another_key_are_rejected() {
    let _ = env_logger::try_init().ok();
    let claims = JwtClaims::new(CUSTOMER_ID, vec![ActorRole::Customer], Utc::now() + Days::new(1));
    let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(b"not-the-real-secret")).unwrap();
    let err = get_request(&format!("Bearer {token}"), "/secure/whoami", configure)
        .await
        .expect_err("Forged token was accepted");
    assert!(err.starts_with("Authentication Error. Access token is invalid."), "{err}");
}

#[actix_web::test]
async fn malformed_headers_are_rejected() {
    let _ = env_logger::try_init().ok();
    let token = customer_token();
    let raw_token = token.trim_start_matches("Bearer ");
    for header in [raw_token, "Bearer not-a-token", "Basic dXNlcjpwYXNz"] {
        let err = get_request(header, "/secure/whoami", configure).await.expect_err("Malformed header was accepted");
        assert!(err.starts_with("Authentication Error. Access token is not in the correct format."), "{header}: {err}");
    }
}

#[actix_web::test]
async fn claims_without_middleware_are_missing() {
    let _ = env_logger::try_init().ok();
    let (status, body) = get_request(&customer_token(), "/open/whoami", configure).await.expect("Request failed");
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, r#"{"error":"Authentication Error. No bearer token was provided."}"#);
}

#[test]
fn validator_round_trips_claims() {
    let validator = TokenValidator::new(&AuthConfig::new(JWT_SECRET));
    let claims = JwtClaims::new(STORE_OWNER_ID, vec![ActorRole::Store], Utc::now() + Days::new(1));
    let token = issue_token(claims.clone());
    let validated = validator.validate(&token).expect("Token should be valid");
    assert_eq!(validated, claims);
    assert_eq!(validated.user_id().unwrap(), STORE_OWNER_ID);
    assert!(validated.has_role(ActorRole::Store));
    assert!(!validated.has_role(ActorRole::Customer));
    assert!(matches!(validator.validate_header(None), Err(AuthError::MissingToken)));
}

#[test]
fn subjects_must_be_user_ids() {
    let claims = JwtClaims { sub: "alice".to_string(), roles: vec![ActorRole::Customer], exp: 0 };
    let err = claims.user_id().unwrap_err();
    assert!(matches!(err, AuthError::ValidationError(_)));
    assert!(err.to_string().contains("Invalid subject alice"));
}

fn configure(cfg: &mut ServiceConfig) {
    async fn whoami(claims: JwtClaims) -> HttpResponse {
        HttpResponse::Ok().body(claims.sub)
    }
    cfg.service(web::scope("/secure").wrap(jwt_middleware()).route("/whoami", web::get().to(whoami)))
        .service(web::scope("/open").route("/whoami", web::get().to(whoami)));
}
