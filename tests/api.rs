use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{HeaderMap, Request, StatusCode, header},
};
use serde_json::{Value, json};
use tower::ServiceExt;
use uuid::Uuid;

use recipe_hub::{
    AppState,
    cache::MemoryCacheStore,
    config::{Config, RateLimitRule},
    database::{LogLevel, MemoryStore, RecipeRepository, UserRepository},
    logger::EventLog,
    routes::create_router,
};

const PHONE: &str = "+15551234567";
const OTHER_PHONE: &str = "+15557654321";
const PASSWORD: &str = "Abcd1234";

fn test_config() -> Config {
    Config {
        debug: false,
        bcrypt_cost: 4,
        rate_limit_default: vec![RateLimitRule::new(10_000, Duration::from_secs(3600))],
        rate_limit_recipes: vec![RateLimitRule::new(10_000, Duration::from_secs(3600))],
        ..Config::default()
    }
}

struct TestApp {
    router: Router,
    store: MemoryStore,
}

struct TestResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Value,
}

impl TestApp {
    fn new() -> Self {
        Self::with_config(test_config(), EventLog::disabled(), MemoryStore::new())
    }

    fn with_config(config: Config, log: EventLog, store: MemoryStore) -> Self {
        let state = AppState::new(
            Arc::new(store.clone()),
            Arc::new(MemoryCacheStore::new()),
            config,
            log,
        );
        Self {
            router: create_router(state),
            store,
        }
    }

    async fn send(&self, req: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        TestResponse {
            status,
            headers,
            body,
        }
    }

    async fn login(&self, phone: &str, password: &str) -> TestResponse {
        let form = format!(
            "username={}&password={}",
            phone.replace('+', "%2B"),
            password
        );
        let req = Request::post("/user/login")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(form))
            .unwrap();
        self.send(req).await
    }

    async fn token_for(&self, phone: &str) -> String {
        let res = self.login(phone, PASSWORD).await;
        assert_eq!(res.status, StatusCode::CREATED, "{}", res.body);
        res.body["access_token"].as_str().unwrap().to_string()
    }

    async fn get(&self, uri: &str, token: Option<&str>) -> TestResponse {
        let mut builder = Request::get(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("JWT {}", token));
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    async fn post(&self, uri: &str, token: &str, body: Option<Value>) -> TestResponse {
        let builder = Request::post(uri).header(header::AUTHORIZATION, format!("JWT {}", token));
        let req = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.send(req).await
    }

    async fn create_recipe(&self, token: &str, title: &str) -> String {
        let res = self
            .post(
                "/recipe/create",
                token,
                Some(json!({
                    "title": title,
                    "content": "Whisk everything together and cook gently",
                    "tags": ["breakfast", "quick"],
                })),
            )
            .await;
        assert_eq!(res.status, StatusCode::CREATED, "{}", res.body);
        res.body["metadata"]["recipe_uuid"].as_str().unwrap().to_string()
    }
}

#[tokio::test]
async fn index_and_ping() {
    let app = TestApp::new();

    let res = app.get("/", None).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body, json!({ "data": "welcome to FoodRecipeHub!!!" }));

    let res = app.get("/ping", None).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["status"], "ok");
}

#[tokio::test]
async fn login_create_then_recipe_ownership() {
    let app = TestApp::new();

    let res = app.login(PHONE, PASSWORD).await;
    assert_eq!(res.status, StatusCode::CREATED);
    assert_eq!(res.body["token_type"], "JWT");
    assert_eq!(res.body["message"], format!("user '{}' login successfully", PHONE));
    let token = res.body["access_token"].as_str().unwrap().to_string();
    assert!(res.body["refresh_token"].as_str().is_some());

    let uuid = app.create_recipe(&token, "Fluffy pancakes").await;

    let owner = app.store.find_by_phone(PHONE).await.unwrap().unwrap();
    let recipe = app
        .store
        .find_by_uuid(uuid.parse::<Uuid>().unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(recipe.user_id, owner.id);

    let other = app.token_for(OTHER_PHONE).await;
    let res = app
        .post(&format!("/recipe/delete?recipe_uuid={}", uuid), &other, None)
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        res.body,
        json!({
            "msg": "The requested recipe does not belong to the authenticated user",
            "type": "Bad Request Exception",
        })
    );

    let res = app
        .post(&format!("/recipe/delete?recipe_uuid={}", uuid), &token, None)
        .await;
    assert_eq!(res.status, StatusCode::ACCEPTED);

    let res = app
        .get(&format!("/recipe/detail?recipe_uuid={}", uuid), None)
        .await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn wrong_password_is_a_credential_error() {
    let app = TestApp::new();
    app.token_for(PHONE).await;

    let res = app.login(PHONE, "Wrong1234").await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.headers[header::WWW_AUTHENTICATE], "JWT");
    assert_eq!(
        res.body,
        json!({ "msg": "Invalid Credentials.", "type": "Credential Exception" })
    );
}

#[tokio::test]
async fn invalid_login_fields_report_details() {
    let app = TestApp::new();

    let res = app.login("5551234", "password").await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    let detail = res.body["detail"].as_array().unwrap();
    assert_eq!(detail.len(), 2);
    assert_eq!(detail[0]["loc"], json!(["password"]));
    assert_eq!(detail[1]["loc"], json!(["username"]));
    assert_eq!(detail[1]["msg"], "Invalid phone number");
}

#[tokio::test]
async fn protected_routes_require_a_valid_token() {
    let app = TestApp::new();

    let res = app.get("/user/detail", None).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.body["msg"], "Not authenticated");

    let res = app.get("/user/detail", Some("garbage")).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.body["msg"], "Invalid Credentials.");
}

#[tokio::test]
async fn refresh_token_rotates_once() {
    let app = TestApp::new();
    let res = app.login(PHONE, PASSWORD).await;
    let access = res.body["access_token"].as_str().unwrap().to_string();
    let refresh = res.body["refresh_token"].as_str().unwrap().to_string();

    let uri = format!("/user/refreshToken?refresh_token={}", refresh);
    let res = app.get(&uri, Some(&access)).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_ne!(res.body["refresh_token"].as_str().unwrap(), refresh);

    let res = app.get(&uri, Some(&access)).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.body["msg"], "Invalid refresh token");
}

#[tokio::test]
async fn logout_is_visible_in_cached_detail() {
    let app = TestApp::new();
    let token = app.token_for(PHONE).await;

    let res = app.get("/user/detail", Some(&token)).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["data"]["is_online"], true);
    assert_eq!(res.body["data"]["phone_number"], PHONE);

    let res = app.get("/user/logout", Some(&token)).await;
    assert_eq!(res.status, StatusCode::OK);

    let res = app.get("/user/detail", Some(&token)).await;
    assert_eq!(res.body["data"]["is_online"], false);

    let owner = app.store.find_by_phone(PHONE).await.unwrap().unwrap();
    assert!(app.store.token_records(owner.id).await.is_empty());
}

#[tokio::test]
async fn recipe_list_is_fresh_after_writes() {
    let app = TestApp::new();
    let token = app.token_for(PHONE).await;
    app.create_recipe(&token, "Tomato basil soup").await;

    let res = app.get("/recipe/list", None).await;
    assert_eq!(res.body["count"], 1);

    let uuid = app.create_recipe(&token, "Garden salad bowl").await;
    let res = app.get("/recipe/list", None).await;
    assert_eq!(res.body["count"], 2);

    let res = app.get("/user/detail", Some(&token)).await;
    assert_eq!(res.body["data"]["recipes"].as_array().unwrap().len(), 2);

    let res = app
        .post(
            "/recipe/update",
            &token,
            Some(json!({ "uuid": uuid, "title": "Crunchy garden salad", "is_active": false })),
        )
        .await;
    assert_eq!(res.status, StatusCode::ACCEPTED);

    let res = app
        .get(&format!("/recipe/detail?recipe_uuid={}", uuid), None)
        .await;
    assert_eq!(res.body["data"]["title"], "Crunchy garden salad");
    assert_eq!(res.body["data"]["is_active"], false);
    assert_eq!(res.body["data"]["user"]["phone_number"], PHONE);
    assert_eq!(
        res.body["data"]["tags"],
        json!([
            { "title": "breakfast", "display_title": "Breakfast" },
            { "title": "quick", "display_title": "Quick & Easy" },
        ])
    );

    let res = app.get("/recipe/list?is_active=true", None).await;
    assert_eq!(res.body["count"], 1);
    let res = app.get("/recipe/list?search=soup", None).await;
    assert_eq!(res.body["data"][0]["title"], "Tomato basil soup");

    let res = app
        .post(&format!("/recipe/delete?recipe_uuid={}", uuid), &token, None)
        .await;
    assert_eq!(res.status, StatusCode::ACCEPTED);

    let res = app.get("/recipe/list", None).await;
    assert_eq!(res.body["count"], 1);
    let res = app.get("/user/detail", Some(&token)).await;
    assert_eq!(res.body["data"]["recipes"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn recipe_update_by_another_user_is_rejected() {
    let app = TestApp::new();
    let owner = app.token_for(PHONE).await;
    let other = app.token_for(OTHER_PHONE).await;
    let uuid = app.create_recipe(&owner, "Chocolate lava cake").await;

    let res = app
        .post(
            "/recipe/update",
            &other,
            Some(json!({ "uuid": uuid, "title": "Stolen lava cake" })),
        )
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let res = app
        .post(
            "/recipe/create",
            &owner,
            Some(json!({ "title": "Tiny", "content": "Too short", "tags": [] })),
        )
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body["detail"][0]["loc"], json!(["content"]));
}

#[tokio::test]
async fn user_list_paginates() {
    let app = TestApp::new();
    let mut token = String::new();
    for i in 0..25 {
        token = app.token_for(&format!("+1555000{:04}", i)).await;
    }

    let res = app
        .get("/user/list?page_number=3&page_size=10", Some(&token))
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["page_count"], 3);
    assert_eq!(res.body["count"], 25);
    assert_eq!(res.body["data"].as_array().unwrap().len(), 5);

    let res = app.get("/user/list?search=0024", Some(&token)).await;
    assert_eq!(res.body["count"], 1);

    let res = app.get("/user/list?page_size=500", Some(&token)).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body["detail"][0]["loc"], json!(["page_size"]));
}

#[tokio::test]
async fn user_update_applies_only_given_fields() {
    let app = TestApp::new();
    let token = app.token_for(PHONE).await;
    app.token_for(OTHER_PHONE).await;

    let res = app
        .post("/user/update", &token, Some(json!({ "username": OTHER_PHONE })))
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let res = app
        .post(
            "/user/update",
            &token,
            Some(json!({ "email": "cook@example.com", "gender": "female", "password": "" })),
        )
        .await;
    assert_eq!(res.status, StatusCode::ACCEPTED, "{}", res.body);

    let res = app.get("/user/detail", Some(&token)).await;
    assert_eq!(res.body["data"]["email"], "cook@example.com");
    assert_eq!(res.body["data"]["gender"], "female");

    // 密码未修改
    assert_eq!(app.login(PHONE, PASSWORD).await.status, StatusCode::CREATED);

    let res = app
        .post("/user/update", &token, Some(json!({ "email": "not-an-email" })))
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn follow_and_unfollow() {
    let app = TestApp::new();
    let me = app.token_for(PHONE).await;
    let them = app.token_for(OTHER_PHONE).await;

    let follow = |phone: &str| format!("/relation/follow?following_phone_number={}", phone.replace('+', "%2B"));
    let unfollow = |phone: &str| format!("/relation/unfollow?following_phone_number={}", phone.replace('+', "%2B"));

    let res = app.post(&follow("+15550000000"), &me, None).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body["msg"], "The requested following not find");

    let res = app.post(&follow(PHONE), &me, None).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    // 先读一次，填充缓存
    let res = app.get("/relation/follower_list", Some(&them)).await;
    assert_eq!(res.body["count"], 0);
    let res = app.get("/relation/following_list", Some(&me)).await;
    assert_eq!(res.body["count"], 0);

    let res = app.post(&follow(OTHER_PHONE), &me, None).await;
    assert_eq!(res.status, StatusCode::OK, "{}", res.body);

    let res = app.post(&follow(OTHER_PHONE), &me, None).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let res = app.get("/relation/follower_list", Some(&them)).await;
    assert_eq!(res.body["count"], 1);
    assert_eq!(res.body["data"][0]["phone_number"], PHONE);

    let res = app.get("/relation/following_list", Some(&me)).await;
    assert_eq!(res.body["data"][0]["phone_number"], OTHER_PHONE);

    let res = app.post(&unfollow(OTHER_PHONE), &me, None).await;
    assert_eq!(res.status, StatusCode::OK);

    let res = app.get("/relation/follower_list", Some(&them)).await;
    assert_eq!(res.body["count"], 0);
    let res = app.get("/relation/following_list", Some(&me)).await;
    assert_eq!(res.body["count"], 0);

    let res = app.post(&unfollow(OTHER_PHONE), &me, None).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn profile_changes_reach_every_cached_view() {
    let app = TestApp::new();
    let me = app.token_for(PHONE).await;
    let them = app.token_for(OTHER_PHONE).await;
    let uuid = app.create_recipe(&me, "Slow roasted tomatoes").await;

    let to = |action: &str, phone: &str| {
        format!("/relation/{}?following_phone_number={}", action, phone.replace('+', "%2B"))
    };
    assert_eq!(app.post(&to("follow", PHONE), &them, None).await.status, StatusCode::OK);
    assert_eq!(app.post(&to("follow", OTHER_PHONE), &me, None).await.status, StatusCode::OK);

    let detail_uri = format!("/recipe/detail?recipe_uuid={}", uuid);
    let email_of_me = |body: &Value| -> Vec<Value> {
        body["data"]
            .as_array()
            .unwrap()
            .iter()
            .filter(|user| user["phone_number"] == PHONE)
            .map(|user| user["email"].clone())
            .collect()
    };

    let res = app.get(&detail_uri, None).await;
    assert_eq!(res.body["data"]["user"]["email"], Value::Null);
    let res = app.get("/recipe/list", None).await;
    assert_eq!(res.body["data"][0]["user"]["email"], Value::Null);
    let res = app.get("/relation/following_list", Some(&them)).await;
    assert_eq!(email_of_me(&res.body), vec![Value::Null]);
    let res = app.get("/relation/follower_list", Some(&them)).await;
    assert_eq!(email_of_me(&res.body), vec![Value::Null]);
    let res = app.get("/user/list", Some(&them)).await;
    assert_eq!(email_of_me(&res.body), vec![Value::Null]);

    let res = app
        .post("/user/update", &me, Some(json!({ "email": "new@example.com" })))
        .await;
    assert_eq!(res.status, StatusCode::ACCEPTED, "{}", res.body);

    let res = app.get(&detail_uri, None).await;
    assert_eq!(res.body["data"]["user"]["email"], "new@example.com");
    let res = app.get("/recipe/list", None).await;
    assert_eq!(res.body["data"][0]["user"]["email"], "new@example.com");
    let res = app.get("/relation/following_list", Some(&them)).await;
    assert_eq!(email_of_me(&res.body), vec![json!("new@example.com")]);
    let res = app.get("/relation/follower_list", Some(&them)).await;
    assert_eq!(email_of_me(&res.body), vec![json!("new@example.com")]);
    let res = app.get("/user/list", Some(&them)).await;
    assert_eq!(email_of_me(&res.body), vec![json!("new@example.com")]);
}

#[tokio::test]
async fn online_filter_follows_login_and_logout() {
    let app = TestApp::new();
    let me = app.token_for(PHONE).await;
    let them = app.token_for(OTHER_PHONE).await;

    let res = app.get("/user/list?is_online=true", Some(&me)).await;
    assert_eq!(res.body["count"], 2);

    assert_eq!(app.get("/user/logout", Some(&them)).await.status, StatusCode::OK);
    let res = app.get("/user/list?is_online=true", Some(&me)).await;
    assert_eq!(res.body["count"], 1);
    assert_eq!(res.body["data"][0]["phone_number"], PHONE);
    let res = app.get("/user/list?is_online=false", Some(&me)).await;
    assert_eq!(res.body["count"], 1);

    app.token_for(OTHER_PHONE).await;
    let res = app.get("/user/list?is_online=true", Some(&me)).await;
    assert_eq!(res.body["count"], 2);
    let res = app.get("/user/list?is_online=false", Some(&me)).await;
    assert_eq!(res.body["count"], 0);
}

#[tokio::test]
async fn unparsable_input_is_a_field_error() {
    let app = TestApp::new();
    let token = app.token_for(PHONE).await;

    let res = app
        .post(
            "/recipe/create",
            &token,
            Some(json!({
                "title": "Mystery stew",
                "content": "Simmer for an hour and serve warm",
                "tags": ["not_a_tag"],
            })),
        )
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body["detail"][0]["loc"], json!(["body"]));
    assert_eq!(res.body["detail"][0]["type"], "value_error");

    let res = app.get("/user/list?page_number=abc", Some(&token)).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body["detail"][0]["loc"], json!(["query"]));

    let res = app.get("/recipe/detail?recipe_uuid=not-a-uuid", None).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body["detail"][0]["loc"], json!(["query"]));

    let req = Request::post("/user/login")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from("username=%2B15551234567"))
        .unwrap();
    let res = app.send(req).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body["detail"][0]["loc"], json!(["body"]));
}

#[tokio::test]
async fn tags_are_listed_with_display_titles() {
    let app = TestApp::new();

    let res = app.get("/recipe/tags?page_size=5", None).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["count"], 14);
    assert_eq!(res.body["page_count"], 3);
    assert_eq!(
        res.body["data"][0],
        json!({ "title": "breakfast", "display_title": "Breakfast" })
    );
}

#[tokio::test]
async fn recipe_routes_are_rate_limited() {
    let config = Config {
        rate_limit_recipes: vec![RateLimitRule::new(2, Duration::from_secs(3600))],
        ..test_config()
    };
    let app = TestApp::with_config(config, EventLog::disabled(), MemoryStore::new());

    assert_eq!(app.get("/recipe/tags", None).await.status, StatusCode::OK);
    assert_eq!(app.get("/recipe/tags", None).await.status, StatusCode::OK);

    let res = app.get("/recipe/tags", None).await;
    assert_eq!(res.status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(res.body, json!({ "error": "Rate limit exceeded: 2 per 1 hour" }));
    assert_eq!(res.headers["x-ratelimit-limit"], "2");
    assert_eq!(res.headers["x-ratelimit-remaining"], "0");
    assert!(res.headers.contains_key(header::RETRY_AFTER));

    // 其他路由组不受影响
    assert_eq!(app.get("/", None).await.status, StatusCode::OK);
}

#[tokio::test]
async fn responses_are_written_to_the_event_log() {
    let store = MemoryStore::new();
    let (log, _writer) = EventLog::spawn(Arc::new(store.clone()));
    let app = TestApp::with_config(test_config(), log, store.clone());

    app.token_for(PHONE).await;
    app.login(PHONE, "Wrong1234").await;

    // 写入任务异步落库
    let mut entries = Vec::new();
    for _ in 0..50 {
        entries = store.log_entries().await;
        if entries.iter().any(|e| e.level == LogLevel::Error) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    assert!(entries.iter().any(|e| {
        e.level == LogLevel::Info
            && e.message["message"] == format!("user '{}' login successfully", PHONE)
    }));
    assert!(entries.iter().any(|e| {
        e.level == LogLevel::Error && e.message["status"] == 401
    }));
    assert!(
        entries
            .iter()
            .all(|e| !e.message.to_string().contains("access_token"))
    );
}
