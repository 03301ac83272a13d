use actix_web::{dev::Payload, test, FromRequest};
use heritagelink::{
    auth::{create_jwt, decode_jwt, Auth},
    models::User,
};
use std::env;

#[cfg(feature = "inmem-store")]
mod common;

// Helper that guarantees a sufficiently long secret for tests.
fn set_secret() {
    env::set_var("JWT_SECRET", "test-secret-must-be-32-bytes-long!!");
}

fn ada() -> User {
    User { id: "u42".into(), name: "Ada".into(), avatar_url: Some("https://i.pravatar.cc/150?u=u42".into()) }
}

#[actix_web::test]
async fn jwt_roundtrip_ok() {
    set_secret();
    let token = create_jwt(&ada()).expect("token");
    // The Auth extractor is the public way to validate, so use it here.
    let req = test::TestRequest::default()
        .insert_header(("Authorization", format!("Bearer {}", token)))
        .to_http_request();
    let mut pl = Payload::None;
    let auth = Auth::from_request(&req, &mut pl).await.expect("extract");
    assert_eq!(auth.user_id(), "u42");
    assert_eq!(auth.author(), ada());
}

#[actix_web::test]
async fn extractor_rejects_invalid_token() {
    set_secret();
    let req = test::TestRequest::default()
        .insert_header(("Authorization", "Bearer notatoken"))
        .to_http_request();
    let mut pl = Payload::None;
    assert!(Auth::from_request(&req, &mut pl).await.is_err());
}

#[actix_web::test]
async fn extractor_requires_header() {
    set_secret();
    let req = test::TestRequest::default().to_http_request();
    let mut pl = Payload::None;
    assert!(Auth::from_request(&req, &mut pl).await.is_err());
}

#[actix_web::test]
async fn token_without_avatar_still_decodes() {
    set_secret();
    let user = User { avatar_url: None, ..ada() };
    let claims = decode_jwt(&create_jwt(&user).expect("token")).expect("decode");
    assert_eq!(claims.sub, "u42");
    assert_eq!(claims.name, "Ada");
    assert!(claims.avatar_url.is_none());
}

#[cfg(feature = "inmem-store")]
#[actix_web::test]
#[serial_test::serial]
async fn me_and_refresh_endpoints() {
    use actix_web::{web, App};
    use heritagelink::{config, moderation::ModerationVerdict, repo::inmem::InMemRepo};
    use serde_json::Value;

    let moderator = common::ScriptedModerator::returning(ModerationVerdict::safe());
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(common::state(InMemRepo::ephemeral(), moderator)))
            .configure(config),
    )
    .await;

    let req = test::TestRequest::get().uri("/api/v1/auth/me").to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 401);

    let req = test::TestRequest::get().uri("/api/v1/auth/me").insert_header(common::bearer("u7")).to_request();
    let me: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(me["id"], "u7");
    assert_eq!(me["name"], "User u7");
    assert_eq!(me["avatarUrl"], "https://i.pravatar.cc/150?u=u7");

    let req = test::TestRequest::post().uri("/api/v1/auth/refresh").insert_header(common::bearer("u7")).to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let claims = decode_jwt(body["token"].as_str().unwrap()).unwrap();
    assert_eq!(claims.sub, "u7");
}
