//! Login, logout, route guarding and account switching through the console.

use reqwest::StatusCode;

use ad_console::session::LOGIN_FAILED_MESSAGE;
use ad_console_integration_tests::{TestConsole, location};

#[tokio::test]
async fn test_health() {
    let console = TestConsole::start().await;
    let response = console.get("/health").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await.expect("body"), "ok");
}

#[tokio::test]
async fn test_anonymous_visit_redirects_to_login_with_next() {
    let console = TestConsole::start().await;

    let response = console.get("/ad-plans?page=2").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        location(&response),
        Some("/login?next=%2Fad-plans%3Fpage%3D2")
    );

    let response = console.get("/").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/login"));
}

#[tokio::test]
async fn test_login_page_renders_for_anonymous_visitor() {
    let console = TestConsole::start().await;
    let body = console.page("/login?next=%2Fad-groups").await;
    assert!(body.contains("name=\"username\""));
    assert!(body.contains("ad-groups"));
}

#[tokio::test]
async fn test_login_returns_to_requested_page() {
    let console = TestConsole::start().await;

    let response = console
        .post_form(
            "/login",
            &[("username", "a"), ("password", "b"), ("next", "/ad-plans")],
        )
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/ad-plans"));

    let body = console.page("/ad-plans").await;
    assert!(body.contains("Spring sale"));
    assert!(body.contains("Summer launch"));
    assert!(!body.contains("Autumn promo"));
}

#[tokio::test]
async fn test_login_ignores_offsite_next() {
    let console = TestConsole::start().await;
    let response = console
        .post_form(
            "/login",
            &[
                ("username", "a"),
                ("password", "b"),
                ("next", "//evil.example/steal"),
            ],
        )
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/"));
}

#[tokio::test]
async fn test_failed_login_rerenders_form_with_error() {
    let console = TestConsole::start().await;

    let response = console.login("a", "wrong").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = response.text().await.expect("body");
    assert!(body.contains(LOGIN_FAILED_MESSAGE));

    let response = console.get("/").await;
    assert_eq!(location(&response), Some("/login"));
}

#[tokio::test]
async fn test_logged_in_visitor_skips_login_page() {
    let console = TestConsole::start().await;
    console.login("a", "b").await;

    let response = console.get("/login?next=%2Fad-groups").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/ad-groups"));
}

#[tokio::test]
async fn test_home_shows_current_account() {
    let console = TestConsole::start().await;
    let response = console.login("a", "b").await;
    assert_eq!(location(&response), Some("/"));

    let body = console.page("/").await;
    assert!(body.contains("North"));
    assert!(body.contains("Spring sale"));
}

#[tokio::test]
async fn test_logout_requires_login_again() {
    let console = TestConsole::start().await;
    console.login("a", "b").await;
    assert_eq!(console.backend.data().tokens.len(), 1);

    let response = console.post_form("/logout", &[]).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/login"));
    assert!(console.backend.data().tokens.is_empty());

    let response = console.get("/ad-plans").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/login?next=%2Fad-plans"));
}

#[tokio::test]
async fn test_revoked_token_sends_visitor_to_login() {
    let console = TestConsole::start().await;
    console.login("a", "b").await;
    console.backend.data().tokens.clear();

    let response = console.get("/ad-plans").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/login"));

    // The session is now logged out.
    let response = console.get("/ad-groups").await;
    assert_eq!(location(&response), Some("/login?next=%2Fad-groups"));
}

#[tokio::test]
async fn test_switch_account_rescopes_lists() {
    let console = TestConsole::start().await;
    console.login("a", "b").await;
    assert!(console.page("/ad-plans").await.contains("Spring sale"));

    let response = console
        .post_form("/account/switch", &[("account_id", "9"), ("next", "/ad-plans")])
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/ad-plans"));

    let body = console.page("/ad-plans").await;
    assert!(body.contains("Autumn promo"));
    assert!(!body.contains("Spring sale"));

    let calls = console.backend.calls("GET", "/ad-plans");
    let last = calls.last().expect("list call");
    assert_eq!(last.param("accountId").as_deref(), Some("9"));
}

#[tokio::test]
async fn test_switch_to_unavailable_account_keeps_selection() {
    let console = TestConsole::start().await;
    console.login("a", "b").await;

    let response = console
        .post_form("/account/switch", &[("account_id", "99"), ("next", "/ad-plans")])
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let body = console.page("/ad-plans").await;
    assert!(body.contains("That account is not available"));
    assert!(body.contains("Spring sale"));
}

#[tokio::test]
async fn test_nav_link_clears_search() {
    let console = TestConsole::start().await;
    console.login("a", "b").await;

    let body = console.page("/ad-plans?name=Summer").await;
    assert!(body.contains("Summer launch"));
    assert!(!body.contains("Spring sale"));
    assert!(body.contains("href=\"/ad-plans?page=1\""));

    // A bare visit keeps the search.
    assert!(!console.page("/ad-plans").await.contains("Spring sale"));

    let body = console.page("/ad-plans?page=1").await;
    assert!(body.contains("Spring sale"));
    assert!(body.contains("Summer launch"));
}
