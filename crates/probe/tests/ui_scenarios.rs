//! Browser scenarios against a scripted Conduit client.
//!
//! The [`MockDriver`] routes below render the same selectors the page objects
//! use, and every click lands its effect after a short delay so that each
//! action has to wait for the UI to catch up.

#![allow(clippy::expect_used, clippy::unwrap_used)]

mod support;

use conduit_probe::auth::STORAGE_KEY;
use conduit_probe::browser::MockDom;
use conduit_probe::prelude::*;
use std::sync::Arc;
use std::time::Duration;
use support::{token_for, Stub, PASSWORD};

const ORIGIN: &str = "http://localhost:3000";
const LAG: Duration = Duration::from_millis(40);

fn config() -> EnvironmentConfig {
    let mut config = EnvironmentConfig::default();
    config.timeouts.page_load_ms = 1_000;
    config.timeouts.state_change_ms = 1_000;
    config.timeouts.poll_interval_ms = 10;
    config.users.insert(
        "alice".to_string(),
        UserCredentials {
            email: "alice@example.com".to_string(),
            password: PASSWORD.to_string(),
            username: Some("alice".to_string()),
        },
    );
    config
}

fn digits(label: &str) -> u64 {
    label
        .chars()
        .filter(char::is_ascii_digit)
        .collect::<String>()
        .parse()
        .unwrap_or(0)
}

fn render_navbar(dom: &mut MockDom) {
    dom.push(NavBar::HOME, ElementState::new("a").with_text("conduit"));
    let user = dom
        .storage_get(STORAGE_KEY)
        .and_then(|v| StoredUser::from_storage_value(v).ok());
    match user {
        Some(user) => {
            dom.push(
                NavBar::SETTINGS,
                ElementState::new("a")
                    .with_href("/user/settings")
                    .with_text("Settings"),
            );
            let name = user.username.unwrap_or_default();
            dom.push(
                NavBar::PROFILE,
                ElementState::new("a")
                    .with_href(format!("/profile/{name}"))
                    .with_text(name),
            );
        }
        None => dom.push(
            NavBar::SIGN_IN,
            ElementState::new("a").with_href("/user/login").with_text("Sign in"),
        ),
    }
}

fn route_login(driver: &MockDriver) {
    driver.route(&format!("{ORIGIN}/user/login"), |dom| {
        render_navbar(dom);
        dom.push(LoginPage::HEADING, ElementState::new("h1").with_text("Sign in"));
        dom.push(LoginPage::EMAIL, ElementState::new("input"));
        dom.push(LoginPage::PASSWORD, ElementState::new("input"));
        dom.push(LoginPage::SUBMIT, ElementState::new("button").with_text("Sign in"));
    });
    driver.on_click(LoginPage::SUBMIT, |dom, _| {
        let email = dom.value_of(LoginPage::EMAIL).unwrap_or_default();
        let password = dom.value_of(LoginPage::PASSWORD).unwrap_or_default();
        if email == "alice@example.com" && password == PASSWORD {
            dom.after(LAG, |dom| {
                let record = StoredUser {
                    username: Some("alice".to_string()),
                    email: Some("alice@example.com".to_string()),
                    ..StoredUser::with_token(token_for(1))
                };
                dom.storage_set(STORAGE_KEY, record.to_storage_value().unwrap());
                dom.set_url(format!("{ORIGIN}/"));
            });
        } else {
            dom.after(LAG, |dom| {
                dom.push(
                    LoginPage::ERRORS,
                    ElementState::new("li").with_text("email or password is invalid"),
                );
            });
        }
    });
}

fn route_home(driver: &MockDriver) {
    driver.route(&format!("{ORIGIN}/"), |dom| {
        render_navbar(dom);
        dom.push(HomePage::CONTAINER, ElementState::new("div"));
    });
}

fn route_article(driver: &MockDriver) {
    driver.route(&format!("{ORIGIN}/article/*"), |dom| {
        render_navbar(dom);
        dom.push(ArticlePage::TITLE, ElementState::new("h1").with_text("Hello Conduit"));
        dom.push(ArticlePage::AUTHOR, ElementState::new("a").with_text("bob"));
        dom.push(
            ArticlePage::META_BUTTONS,
            ElementState::new("button")
                .with_class("btn-outline-secondary")
                .with_text("Follow bob"),
        );
        dom.push(
            ArticlePage::META_BUTTONS,
            ElementState::new("button")
                .with_class("btn-outline-primary")
                .with_text("Favorite Article (4)"),
        );
        dom.push(ArticlePage::COMMENT_INPUT, ElementState::new("textarea"));
        dom.push(
            ArticlePage::COMMENT_SUBMIT,
            ElementState::new("button").with_text("Post Comment"),
        );
    });

    driver.on_click(ArticlePage::META_BUTTONS, |dom, index| {
        dom.after(LAG, move |dom| {
            let Some(button) = dom.get_mut(ArticlePage::META_BUTTONS, index) else {
                return;
            };
            if button.text.contains("ollow") {
                let label = if button.text.contains("Unfollow") {
                    "Follow bob"
                } else {
                    "Unfollow bob"
                };
                *button = ElementState::new("button").with_text(label);
            } else {
                let count = digits(&button.text);
                *button = if button.has_class("btn-primary") {
                    ElementState::new("button")
                        .with_class("btn-outline-primary")
                        .with_text(format!("Favorite Article ({})", count - 1))
                } else {
                    ElementState::new("button")
                        .with_class("btn-primary")
                        .with_text(format!("Unfavorite Article ({})", count + 1))
                };
            }
        });
    });

    driver.on_click(ArticlePage::COMMENT_SUBMIT, |dom, _| {
        let text = dom.value_of(ArticlePage::COMMENT_INPUT).unwrap_or_default();
        dom.after(LAG, move |dom| {
            // The client renders comment bodies as escaped text
            let card = ElementState::new("div")
                .with_class("card")
                .with_class("comment")
                .with_html(format!(
                    "<p class=\"card-text\">{}</p><span class=\"mod-options\"><i class=\"ion-trash-a\"></i></span>",
                    conduit_probe::browser::escape_html(&text)
                ));
            dom.push(ArticlePage::COMMENT_CARDS, card);
            dom.push(ArticlePage::COMMENT_TEXT, ElementState::new("p").with_text(text));
            dom.push(ArticlePage::COMMENT_DELETE, ElementState::new("i"));
        });
    });

    driver.on_click(ArticlePage::COMMENT_DELETE, |dom, index| {
        dom.after(LAG, move |dom| {
            dom.remove_at(ArticlePage::COMMENT_CARDS, index);
            dom.remove_at(ArticlePage::COMMENT_TEXT, index);
            dom.remove_at(ArticlePage::COMMENT_DELETE, index);
        });
    });
}

fn route_editor(driver: &MockDriver) {
    driver.route(&format!("{ORIGIN}/editor/new"), |dom| {
        render_navbar(dom);
        for selector in [
            EditorPage::TITLE,
            EditorPage::DESCRIPTION,
            EditorPage::BODY,
            EditorPage::TAG_INPUT,
        ] {
            dom.push(selector, ElementState::new("input"));
        }
        dom.push(
            EditorPage::SUBMIT,
            ElementState::new("button").with_text("Publish Article"),
        );
    });
    driver.on_enter(EditorPage::TAG_INPUT, |dom, _| {
        if let Some(tag) = dom.value_of(EditorPage::TAG_INPUT) {
            dom.push(EditorPage::TAGS, ElementState::new("span").with_text(tag));
        }
        if let Some(input) = dom.get_mut(EditorPage::TAG_INPUT, 0) {
            input.value = None;
        }
    });
    driver.on_click(EditorPage::SUBMIT, |dom, _| {
        let title = dom.value_of(EditorPage::TITLE).unwrap_or_default();
        dom.after(LAG, move |dom| {
            if title.trim().is_empty() {
                dom.push(
                    EditorPage::ERRORS,
                    ElementState::new("li").with_text("title can't be empty"),
                );
            } else {
                let slug = title.to_lowercase().replace(' ', "-");
                dom.set_url(format!("{ORIGIN}/article/{slug}"));
            }
        });
    });
}

fn route_settings(driver: &MockDriver) {
    driver.route(&format!("{ORIGIN}/user/settings"), |dom| {
        render_navbar(dom);
        dom.push(SettingsPage::CONTAINER, ElementState::new("div"));
        dom.push(
            SettingsPage::USERNAME,
            ElementState::new("input").with_value("alice"),
        );
        dom.push(
            SettingsPage::EMAIL,
            ElementState::new("input").with_value("alice@example.com"),
        );
        dom.push(SettingsPage::BIO, ElementState::new("textarea"));
        dom.push(
            SettingsPage::SUBMIT,
            ElementState::new("button").with_text("Update Settings"),
        );
        dom.push(
            SettingsPage::LOGOUT,
            ElementState::new("button").with_text("Or click here to logout."),
        );
    });
    driver.on_click(SettingsPage::SUBMIT, |dom, _| {
        let email = dom.value_of(SettingsPage::EMAIL).unwrap_or_default();
        let username = dom.value_of(SettingsPage::USERNAME).unwrap_or_default();
        dom.after(LAG, move |dom| {
            if email.contains('@') {
                dom.set_url(format!("{ORIGIN}/profile/{username}"));
            } else {
                dom.push(
                    SettingsPage::ERRORS,
                    ElementState::new("li").with_text("email is invalid"),
                );
            }
        });
    });
    driver.on_click(SettingsPage::LOGOUT, |dom, _| {
        dom.after(LAG, |dom| {
            dom.storage_remove(STORAGE_KEY);
            dom.set_url(format!("{ORIGIN}/"));
        });
    });
}

fn profile_tabs(dom: &mut MockDom, favorites: bool) {
    let tab = |label: &str, active: bool| {
        let tab = ElementState::new("a").with_text(label);
        if active {
            tab.with_class("active")
        } else {
            tab
        }
    };
    dom.set(
        ProfilePage::TABS,
        vec![
            tab("My Articles", !favorites),
            tab("Favorited Articles", favorites),
        ],
    );
    let titles: &[&str] = if favorites {
        &["Borrowed Wisdom"]
    } else {
        &["Hello Conduit", "Second Post"]
    };
    dom.set(
        ProfilePage::ARTICLE_TITLES,
        titles
            .iter()
            .map(|t| ElementState::new("h1").with_text(*t))
            .collect(),
    );
}

fn route_profile(driver: &MockDriver) {
    driver.route(&format!("{ORIGIN}/profile/*"), |dom| {
        render_navbar(dom);
        let name = dom.url().rsplit('/').next().unwrap_or_default().to_string();
        if name == "nobody" {
            dom.push(
                ProfilePage::ERROR,
                ElementState::new("div").with_text("profile not found"),
            );
            return;
        }
        dom.push(ProfilePage::USERNAME, ElementState::new("h4").with_text(&name));
        dom.push(ProfilePage::BIO, ElementState::new("p").with_text(format!("{name} writes")));
        if name == "alice" {
            dom.push(
                ProfilePage::EDIT_SETTINGS,
                ElementState::new("a")
                    .with_href("/user/settings")
                    .with_text("Edit Profile Settings"),
            );
        } else {
            dom.push(
                ProfilePage::FOLLOW_BUTTON,
                ElementState::new("button").with_text(format!("Follow {name}")),
            );
        }
        profile_tabs(dom, false);
    });
    driver.on_click(ProfilePage::FOLLOW_BUTTON, |dom, _| {
        dom.after(LAG, |dom| {
            let Some(button) = dom.get_mut(ProfilePage::FOLLOW_BUTTON, 0) else {
                return;
            };
            let name = button.text.rsplit(' ').next().unwrap_or_default().to_string();
            let label = if button.text.starts_with("Unfollow") {
                format!("Follow {name}")
            } else {
                format!("Unfollow {name}")
            };
            *button = ElementState::new("button").with_text(label);
        });
    });
    driver.on_click(ProfilePage::TABS, |dom, index| {
        dom.after(LAG, move |dom| profile_tabs(dom, index == 1));
    });
}

fn conduit_app() -> (Arc<MockDriver>, BrowserSession) {
    let driver = Arc::new(MockDriver::new());
    route_home(&driver);
    route_login(&driver);
    route_article(&driver);
    route_editor(&driver);
    route_settings(&driver);
    route_profile(&driver);
    let session = BrowserSession::new(driver.clone(), &config());
    (driver, session)
}

// ============================================================================
// Sign in
// ============================================================================

#[tokio::test]
async fn test_login_ui_stores_token() {
    let (driver, browser) = conduit_app();
    let session = Session::new(&config()).unwrap().with_browser(browser);
    let user = session.login_ui("alice").await.unwrap();
    assert_eq!(subject_of(&user.token).as_deref(), Some("1"));
    assert_eq!(session.browser_token().await.unwrap(), Some(user.token));
    assert_eq!(driver.count_calls("click:button[type='submit']"), 1);
}

#[tokio::test]
async fn test_login_ui_ignores_token_left_in_storage() {
    let (_driver, browser) = conduit_app();
    browser.open("/").await.unwrap();
    browser.set_local_storage_token(&token_for(2)).await.unwrap();

    let session = Session::new(&config()).unwrap().with_browser(browser);
    let user = session.login_ui("alice").await.unwrap();
    assert_eq!(subject_of(&user.token).as_deref(), Some("1"));
    assert_eq!(user.email.as_deref(), Some("alice@example.com"));
}

#[tokio::test]
async fn test_login_ui_with_other_user_stored_waits_then_times_out() {
    let (driver, browser) = conduit_app();
    let mut fast = config();
    fast.timeouts.state_change_ms = 150;
    let browser = BrowserSession::new(browser.driver().clone(), &fast);
    let page = LoginPage::new(&browser);
    page.open().await.unwrap();
    let bob = StoredUser {
        email: Some("bob@example.com".to_string()),
        ..StoredUser::with_token(token_for(2))
    };
    browser.set_stored_user(&bob).await.unwrap();
    // Submit is swallowed, so only bob's record is ever visible
    driver.on_click(LoginPage::SUBMIT, |_, _| {});

    let err = page.login("alice@example.com", PASSWORD).await.unwrap_err();
    assert!(err.is_timeout());
    assert!(err.to_string().contains("bob@example.com"));
}

#[tokio::test]
async fn test_rejected_login_shows_error_and_no_token() {
    let (_driver, browser) = conduit_app();
    let page = LoginPage::new(&browser);
    page.open().await.unwrap();
    let errors = page
        .login_expecting_error("alice@example.com", "wrong")
        .await
        .unwrap();
    assert_eq!(errors, vec!["email or password is invalid"]);
    assert!(page.has_error_containing("INVALID").await.unwrap());
    assert_eq!(browser.stored_token().await.unwrap(), None);
}

// ============================================================================
// Article interactions
// ============================================================================

#[tokio::test]
async fn test_follow_then_unfollow_round_trip() {
    let (_driver, browser) = conduit_app();
    let article = ArticlePage::new(&browser);
    article.open("hello-conduit").await.unwrap();

    article.follow_author().await.unwrap();
    assert!(article.is_following_author().await.unwrap());

    article.unfollow_author().await.unwrap();
    let label = article.follow_button_text().await.unwrap();
    assert!(label.contains("Follow"));
    assert!(!label.contains("Unfollow"));
}

#[tokio::test]
async fn test_follow_author_twice_clicks_once() {
    let (driver, browser) = conduit_app();
    let article = ArticlePage::new(&browser);
    article.open("hello-conduit").await.unwrap();

    article.follow_author().await.unwrap();
    article.follow_author().await.unwrap();
    assert!(article.is_following_author().await.unwrap());
    assert_eq!(driver.count_calls("click:.article-meta button#0"), 1);
}

#[tokio::test]
async fn test_favorite_twice_counts_once() {
    let (driver, browser) = conduit_app();
    let article = ArticlePage::new(&browser);
    article.open("hello-conduit").await.unwrap();
    assert_eq!(article.favorite_count().await.unwrap(), 4);

    assert_eq!(article.favorite().await.unwrap(), 5);
    assert_eq!(article.favorite().await.unwrap(), 5);
    assert_eq!(driver.count_calls("click:.article-meta button#1"), 1);

    assert_eq!(article.unfavorite().await.unwrap(), 4);
    assert!(!article.is_favorited().await.unwrap());
}

#[tokio::test]
async fn test_script_comment_renders_as_text() {
    let (_driver, browser) = conduit_app();
    let article = ArticlePage::new(&browser);
    article.open("hello-conduit").await.unwrap();

    let payload = "<script>alert('xss')</script>";
    article.post_comment(payload).await.unwrap();
    assert_eq!(article.comment_count().await.unwrap(), 1);
    assert_eq!(article.comment_texts().await.unwrap(), vec![payload]);
    assert!(!article.has_executable_script_in_comments().await.unwrap());
}

#[tokio::test]
async fn test_unescaped_comment_is_detected() {
    let (driver, browser) = conduit_app();
    let article = ArticlePage::new(&browser);
    article.open("hello-conduit").await.unwrap();
    driver.with_dom(|dom| {
        dom.push(
            ArticlePage::COMMENT_TEXT,
            ElementState::new("p").with_html("<SCRIPT>alert(1)</SCRIPT>"),
        );
    });
    assert!(article.has_executable_script_in_comments().await.unwrap());
}

#[tokio::test]
async fn test_delete_own_comment() {
    let (_driver, browser) = conduit_app();
    let article = ArticlePage::new(&browser);
    article.open("hello-conduit").await.unwrap();
    article.post_comment("keep me").await.unwrap();
    article.post_comment("remove me").await.unwrap();

    article.delete_comment("remove me").await.unwrap();
    assert_eq!(article.comment_texts().await.unwrap(), vec!["keep me"]);
}

#[tokio::test]
async fn test_delete_comment_while_another_arrives() {
    let (driver, browser) = conduit_app();
    let article = ArticlePage::new(&browser);
    article.open("hello-conduit").await.unwrap();
    article.post_comment("remove me").await.unwrap();

    // Another reader's comment lands before the deletion does
    driver.with_dom(|dom| {
        dom.after(Duration::from_millis(10), |dom| {
            dom.push(
                ArticlePage::COMMENT_CARDS,
                ElementState::new("div").with_class("card").with_class("comment"),
            );
            dom.push(ArticlePage::COMMENT_TEXT, ElementState::new("p").with_text("nice post"));
        });
    });
    article.delete_comment("remove me").await.unwrap();
    assert_eq!(article.comment_texts().await.unwrap(), vec!["nice post"]);
}

#[tokio::test]
async fn test_stale_button_is_retried_once() {
    let (driver, browser) = conduit_app();
    let article = ArticlePage::new(&browser);
    article.open("hello-conduit").await.unwrap();
    driver.stale_next(ArticlePage::META_BUTTONS, 1);
    article.follow_author().await.unwrap();
    assert!(article.is_following_author().await.unwrap());
}

// ============================================================================
// Profiles
// ============================================================================

#[tokio::test]
async fn test_profile_follow_twice_clicks_once() {
    let (driver, browser) = conduit_app();
    let profile = ProfilePage::new(&browser);
    profile.open("bob").await.unwrap();
    assert_eq!(profile.username().await.unwrap(), "bob");
    assert!(!profile.is_own_profile().await.unwrap());

    profile.follow().await.unwrap();
    profile.follow().await.unwrap();
    assert!(profile.is_following().await.unwrap());
    assert_eq!(driver.count_calls("click:.user-info .btn.action-btn#0"), 1);
}

#[tokio::test]
async fn test_profile_unfollow_settles_on_follow_label() {
    let (driver, browser) = conduit_app();
    let profile = ProfilePage::new(&browser);
    profile.open("bob").await.unwrap();
    profile.follow().await.unwrap();

    profile.unfollow().await.unwrap();
    assert_eq!(profile.follow_button_text().await.unwrap(), "Follow bob");
    assert!(!profile.is_following().await.unwrap());
    profile.unfollow().await.unwrap();
    assert_eq!(driver.count_calls("click:.user-info .btn.action-btn#0"), 2);
}

#[tokio::test]
async fn test_profile_tabs_switch_article_lists() {
    let (_driver, browser) = conduit_app();
    let profile = ProfilePage::new(&browser);
    profile.open("bob").await.unwrap();
    assert_eq!(
        profile.article_titles().await.unwrap(),
        vec!["Hello Conduit", "Second Post"]
    );

    profile.open_favorites().await.unwrap();
    assert_eq!(profile.article_titles().await.unwrap(), vec!["Borrowed Wisdom"]);

    profile.open_own_articles().await.unwrap();
    assert_eq!(profile.article_titles().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_own_profile_has_no_follow_button() {
    let (driver, browser) = conduit_app();
    let profile = ProfilePage::new(&browser);
    profile.open("alice").await.unwrap();
    assert!(profile.is_own_profile().await.unwrap());

    let err = profile.follow().await.unwrap_err();
    assert!(matches!(err, ProbeError::UiInteraction { ref action, .. } if action == "follow"));
    assert_eq!(driver.count_calls("click:"), 0);
}

#[tokio::test]
async fn test_unknown_profile_is_not_found() {
    let (_driver, browser) = conduit_app();
    browser.open(&ProfilePage::path("nobody")).await.unwrap();
    assert!(ProfilePage::new(&browser).is_not_found().await.unwrap());
}

// ============================================================================
// Editor and settings
// ============================================================================

#[tokio::test]
async fn test_publish_returns_slug() {
    let (_driver, browser) = conduit_app();
    let editor = EditorPage::new(&browser);
    editor.open_new().await.unwrap();
    let draft = ArticleDraft {
        title: "Ownership Explained".to_string(),
        description: "Borrowing, briefly".to_string(),
        body: "Every value has one owner.".to_string(),
        tag_list: vec!["rust".to_string(), "memory".to_string()],
    };
    let slug = editor.publish(&draft).await.unwrap();
    assert_eq!(slug, "ownership-explained");
    assert!(!editor.is_on_editor().await.unwrap());
}

#[tokio::test]
async fn test_publish_without_title_shows_errors() {
    let (_driver, browser) = conduit_app();
    let editor = EditorPage::new(&browser);
    editor.open_new().await.unwrap();
    let draft = ArticleDraft {
        title: String::new(),
        description: "d".to_string(),
        body: "b".to_string(),
        tag_list: Vec::new(),
    };
    let errors = editor.publish_expecting_error(&draft).await.unwrap();
    assert_eq!(errors, vec!["title can't be empty"]);
    assert!(editor.is_on_editor().await.unwrap());
}

#[tokio::test]
async fn test_settings_update_saved_and_rejected() {
    let (_driver, browser) = conduit_app();
    let settings = SettingsPage::new(&browser);
    settings.open().await.unwrap();
    assert_eq!(settings.current().await.unwrap().username.as_deref(), Some("alice"));

    let outcome = settings.update(&SettingsForm::bio("hello")).await.unwrap();
    assert_eq!(
        outcome,
        SettingsOutcome::Saved {
            url: format!("{ORIGIN}/profile/alice")
        }
    );

    settings.open().await.unwrap();
    let outcome = settings
        .update(&SettingsForm::email("not-an-email"))
        .await
        .unwrap();
    assert_eq!(
        outcome,
        SettingsOutcome::Rejected(vec!["email is invalid".to_string()])
    );
}

#[tokio::test]
async fn test_settings_logout_clears_token() {
    let (_driver, browser) = conduit_app();
    browser.open("/").await.unwrap();
    browser.set_local_storage_token(&token_for(1)).await.unwrap();
    let settings = SettingsPage::new(&browser);
    settings.open().await.unwrap();
    settings.logout().await.unwrap();
    assert_eq!(browser.stored_token().await.unwrap(), None);
}

#[tokio::test]
async fn test_missing_element_times_out_with_last_observation() {
    let (_driver, browser) = conduit_app();
    let mut fast = config();
    fast.timeouts.state_change_ms = 100;
    let browser = BrowserSession::new(browser.driver().clone(), &fast);
    browser.open("/").await.unwrap();
    let err = browser
        .wait_for_text(ArticlePage::TITLE, "never")
        .await
        .unwrap_err();
    assert!(err.is_timeout());
    assert!(err.to_string().contains("never"));
}

// ============================================================================
// Both channels
// ============================================================================

#[tokio::test]
async fn test_api_login_mirrored_into_browser() {
    let stub = Stub::start().await;
    let mut config = stub.config();
    config.timeouts.page_load_ms = 1_000;
    config.timeouts.poll_interval_ms = 10;
    let (_driver, browser) = conduit_app();
    let session = Session::new(&config).unwrap().with_browser(browser);

    let token = session.login_api("alice").await.unwrap();
    session.mirror_token_to_browser().await.unwrap();

    let navbar = NavBar::new(session.browser().unwrap());
    assert!(navbar.is_logged_in().await.unwrap());
    assert_eq!(navbar.username().await.unwrap().as_deref(), Some("alice"));
    assert_eq!(session.reconcile().await.unwrap(), token);
}

#[tokio::test]
async fn test_different_users_in_each_channel_mismatch() {
    let stub = Stub::start().await;
    let (_driver, browser) = conduit_app();
    let session = Session::new(&stub.config()).unwrap().with_browser(browser);
    session.login_api("alice").await.unwrap();

    let browser = session.browser().unwrap();
    browser.open("/").await.unwrap();
    browser.set_local_storage_token(&token_for(2)).await.unwrap();

    let err = session.reconcile().await.unwrap_err();
    assert!(matches!(err, ProbeError::TokenMismatch { .. }));

    session.adopt_browser_token().await.unwrap();
    assert_eq!(subject_of(&session.reconcile().await.unwrap()).as_deref(), Some("2"));
}

#[tokio::test]
async fn test_failed_ui_test_captures_screenshot() {
    let (_driver, browser) = conduit_app();
    let reporter = Reporter::new().with_name("ui");
    let suite = Suite::new(reporter.clone());
    let status = suite
        .run_ui("title mismatch", &browser, |ctx| {
            let browser = &browser;
            async move {
                let article = ArticlePage::new(browser);
                article.open("hello-conduit").await?;
                ctx.check_eq(&article.title().await?, &"Goodbye".to_string(), "title")
            }
        })
        .await
        .unwrap();
    assert!(status.is_failed());

    let failures = reporter.failures();
    let report = &failures[0];
    assert!(report.screenshot.is_some());
    assert!(report.info.iter().any(|line| line.starts_with("FAIL: ")));

    let dir = tempfile::tempdir().unwrap();
    let artifacts = reporter.flush(dir.path()).unwrap();
    assert_eq!(artifacts.screenshots.len(), 1);
}
