//! Built-in smoke scenarios.
//!
//! Each scenario logs in over REST, creates whatever fixtures it needs with
//! unique names, and deletes them again before returning, whether or not its
//! checks passed.

use crate::commands::SmokeArgs;
use crate::error::CliResult;
use crate::output::ProgressReporter;
use conduit_probe::api::{
    extract_comment_id, extract_created_at, extract_slug, extract_updated_at, is_iso8601,
    parse_timestamp, unique_name, ArticleUpdate, CommentsEnvelope,
};
use conduit_probe::{
    ApiClient, ArticleDraft, EnvironmentConfig, ProbeError, ProbeResult, ReportArtifacts,
    Reporter, Session, Suite, TestContext, TestReport, TokenClaims,
};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

/// Delay before an update, so second-resolution backends still advance
/// `updatedAt`
const UPDATE_DELAY: Duration = Duration::from_millis(1_100);

const LOGIN: &str = "login returns a decodable token";
const CREATE_TIMESTAMPS: &str = "created article has createdAt == updatedAt";
const UPDATE_TIMESTAMPS: &str = "update advances updatedAt only";
const DELETE_MATRIX: &str = "delete requires the author (401/403/204/404)";
const COMMENT_ROUND_TRIP: &str = "comment round trip";
const UI_MIRROR: &str = "API login mirrored into the browser";

/// Result of a smoke run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SmokeSummary {
    /// Suite name
    pub suite: String,
    /// Scenarios run
    pub total: usize,
    /// Passed scenarios
    pub passed: usize,
    /// Failed scenarios
    pub failed: usize,
    /// Skipped scenarios
    pub skipped: usize,
    /// Pass rate over non-skipped scenarios
    pub pass_rate: f64,
    /// Sum of scenario durations
    pub duration_ms: u64,
    /// HTML report
    pub html_report: PathBuf,
    /// JSON report
    pub json_report: PathBuf,
}

impl SmokeSummary {
    fn new(reporter: &Reporter, suite: &str, artifacts: ReportArtifacts) -> Self {
        Self {
            suite: suite.to_string(),
            total: reporter.total_count(),
            passed: reporter.passed_count(),
            failed: reporter.failed_count(),
            skipped: reporter.skipped_count(),
            pass_rate: reporter.pass_rate(),
            duration_ms: reporter.total_duration_ms(),
            html_report: artifacts.html,
            json_report: artifacts.json,
        }
    }

    /// Whether no scenario failed
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.failed == 0
    }
}

/// Run every smoke scenario and write the reports.
///
/// Fails early if the primary user is not configured; a missing secondary
/// user only skips the scenarios that need it.
pub async fn run_smoke(
    config: &EnvironmentConfig,
    args: &SmokeArgs,
    out: &mut ProgressReporter,
) -> CliResult<SmokeSummary> {
    config.user(&args.user)?;

    let suite_name = "conduit-probe smoke";
    let reporter = Reporter::new().with_name(suite_name);
    let suite = Suite::new(reporter.clone());
    let user = args.user.as_str();
    let other = args.other_user.as_str();

    out.header(&format!("Smoke: {} ({})", config.base_url, config.api_url));
    let total = if args.ui { 6 } else { 5 };
    out.start_progress(total, "starting");

    out.set_message(LOGIN);
    suite.run(LOGIN, |ctx| login_returns_token(ctx, config, user)).await?;
    report_last(&reporter, out);

    out.set_message(CREATE_TIMESTAMPS);
    suite
        .run(CREATE_TIMESTAMPS, |ctx| created_timestamps_match(ctx, config, user))
        .await?;
    report_last(&reporter, out);

    out.set_message(UPDATE_TIMESTAMPS);
    suite
        .run(UPDATE_TIMESTAMPS, |ctx| update_advances_updated_at(ctx, config, user))
        .await?;
    report_last(&reporter, out);

    out.set_message(DELETE_MATRIX);
    suite
        .run(DELETE_MATRIX, |ctx| delete_authorization(ctx, config, user, other))
        .await?;
    report_last(&reporter, out);

    out.set_message(COMMENT_ROUND_TRIP);
    suite
        .run(COMMENT_ROUND_TRIP, |ctx| comment_round_trip(ctx, config, user))
        .await?;
    report_last(&reporter, out);

    if args.ui {
        out.set_message(UI_MIRROR);
        run_ui_scenario(&suite, config, user).await?;
        report_last(&reporter, out);
    }
    out.finish();

    let dir = args
        .output
        .clone()
        .unwrap_or_else(|| config.report_dir.clone());
    let artifacts = reporter.flush(&dir)?;
    tracing::info!(summary = %reporter.summary(), dir = %dir.display(), "smoke run finished");
    Ok(SmokeSummary::new(&reporter, suite_name, artifacts))
}

fn report_last(reporter: &Reporter, out: &ProgressReporter) {
    if let Some(report) = reporter.results().last() {
        out.record(report);
    }
}

async fn login(config: &EnvironmentConfig, user: &str) -> ProbeResult<(ApiClient, String)> {
    let api = ApiClient::from_config(config)?;
    let creds = config.user(user)?;
    let token = api.login(&creds.email, &creds.password).await?;
    Ok((api, token))
}

async fn create_fixture(ctx: &TestContext, api: &ApiClient, token: &str) -> ProbeResult<String> {
    let resp = api
        .create_article(&ArticleDraft::unique("smoke"), Some(token))
        .await?;
    ctx.check(resp.is_success(), format!("create article: status {}", resp.status()))?;
    extract_slug(resp.body())
        .ok_or_else(|| ProbeError::assertion("create response carried no slug"))
}

async fn cleanup(api: &ApiClient, slug: &str, token: &str) {
    match api.delete_article(slug, Some(token)).await {
        Ok(resp) if resp.is_success() || resp.status() == 404 => {}
        Ok(resp) => tracing::warn!(slug, status = resp.status(), "fixture cleanup rejected"),
        Err(e) => tracing::warn!(slug, error = %e, "fixture cleanup failed"),
    }
}

// ============================================================================
// Scenarios
// ============================================================================

async fn login_returns_token(
    ctx: TestContext,
    config: &EnvironmentConfig,
    user: &str,
) -> ProbeResult<()> {
    let session = Session::new(config)?;
    let token = session.login_api(user).await?;
    ctx.check(!token.is_empty(), "login issued a token")?;
    let claims = TokenClaims::decode(&token)?;
    ctx.info(format!("token subject {:?}", claims.sub));

    let resp = session.api().current_user(Some(&token)).await?;
    ctx.check_eq(&resp.status(), &200, "GET /user status")
}

async fn created_timestamps_match(
    ctx: TestContext,
    config: &EnvironmentConfig,
    user: &str,
) -> ProbeResult<()> {
    let (api, token) = login(config, user).await?;
    let resp = api
        .create_article(&ArticleDraft::unique("smoke"), Some(&token))
        .await?;
    ctx.check(resp.is_success(), format!("create article: status {}", resp.status()))?;
    let slug = extract_slug(resp.body());

    let outcome = check_created_timestamps(&ctx, resp.body());
    if let Some(slug) = slug {
        cleanup(&api, &slug, &token).await;
    }
    outcome
}

fn check_created_timestamps(ctx: &TestContext, body: &str) -> ProbeResult<()> {
    let created =
        extract_created_at(body).ok_or_else(|| ProbeError::assertion("createdAt missing"))?;
    let updated =
        extract_updated_at(body).ok_or_else(|| ProbeError::assertion("updatedAt missing"))?;
    ctx.check(is_iso8601(&created), format!("createdAt {created:?} is ISO-8601"))?;
    ctx.check_eq(&updated, &created, "updatedAt")
}

async fn update_advances_updated_at(
    ctx: TestContext,
    config: &EnvironmentConfig,
    user: &str,
) -> ProbeResult<()> {
    let (api, token) = login(config, user).await?;
    let slug = create_fixture(&ctx, &api, &token).await?;

    let outcome = async {
        let before = api.get_article(&slug, Some(&token)).await?;
        let created = extract_created_at(before.body())
            .ok_or_else(|| ProbeError::assertion("createdAt missing"))?;

        tokio::time::sleep(UPDATE_DELAY).await;
        let update = ArticleUpdate {
            body: Some("Updated by the smoke run".to_string()),
            ..ArticleUpdate::default()
        };
        let resp = api.update_article(&slug, &update, Some(&token)).await?;
        ctx.check(resp.is_success(), format!("update: status {}", resp.status()))?;

        let after_created = extract_created_at(resp.body()).unwrap_or_default();
        let after_updated = extract_updated_at(resp.body()).unwrap_or_default();
        ctx.check_eq(&after_created, &created, "createdAt after update")?;
        let advanced = matches!(
            (parse_timestamp(&after_updated), parse_timestamp(&created)),
            (Some(updated), Some(created)) if updated > created
        );
        ctx.check(
            advanced,
            format!("updatedAt {after_updated:?} is after createdAt {created:?}"),
        )
    }
    .await;

    cleanup(&api, &slug, &token).await;
    outcome
}

async fn delete_authorization(
    ctx: TestContext,
    config: &EnvironmentConfig,
    owner: &str,
    other: &str,
) -> ProbeResult<()> {
    if config.user(other).is_err() {
        return ctx.skip(format!("second user {other:?} is not configured"));
    }
    let (api, owner_token) = login(config, owner).await?;
    let (_, other_token) = login(config, other).await?;
    let slug = create_fixture(&ctx, &api, &owner_token).await?;

    let outcome = async {
        let anonymous = api.delete_article(&slug, None).await?;
        ctx.check_eq(&anonymous.status(), &401, "anonymous delete status")?;
        let foreign = api.delete_article(&slug, Some(&other_token)).await?;
        ctx.check_eq(&foreign.status(), &403, "non-author delete status")?;
        let own = api.delete_article(&slug, Some(&owner_token)).await?;
        ctx.check_eq(&own.status(), &204, "author delete status")?;
        let gone = api.get_article(&slug, None).await?;
        ctx.check_eq(&gone.status(), &404, "status after delete")
    }
    .await;

    cleanup(&api, &slug, &owner_token).await;
    outcome
}

async fn comment_round_trip(
    ctx: TestContext,
    config: &EnvironmentConfig,
    user: &str,
) -> ProbeResult<()> {
    let (api, token) = login(config, user).await?;
    let slug = create_fixture(&ctx, &api, &token).await?;
    let text = unique_name("smoke comment");

    let outcome = async {
        let resp = api.add_comment(&slug, &text, Some(&token)).await?;
        ctx.check(resp.is_success(), format!("add comment: status {}", resp.status()))?;
        let id = extract_comment_id(resp.body())
            .ok_or_else(|| ProbeError::assertion("comment id missing"))?;

        let listed = api.get_comments(&slug, Some(&token)).await?;
        let comments = listed.json::<CommentsEnvelope>()?.comments;
        ctx.check(
            comments.iter().any(|c| c.body.as_deref() == Some(text.as_str())),
            "comment listed on the article",
        )?;

        let deleted = api.delete_comment(&slug, &id, Some(&token)).await?;
        ctx.check(deleted.is_success(), format!("delete comment: status {}", deleted.status()))?;
        let listed = api.get_comments(&slug, Some(&token)).await?;
        let comments = listed.json::<CommentsEnvelope>()?.comments;
        ctx.check(
            comments.iter().all(|c| c.id_string().as_deref() != Some(id.as_str())),
            "comment gone after delete",
        )
    }
    .await;

    cleanup(&api, &slug, &token).await;
    outcome
}

// ============================================================================
// Browser scenario
// ============================================================================

#[cfg(feature = "browser")]
async fn run_ui_scenario(suite: &Suite, config: &EnvironmentConfig, user: &str) -> CliResult<()> {
    use conduit_probe::pages::{NavBar, PageObject};

    let session = match Session::launch(config).await {
        Ok(session) => session,
        Err(e) => {
            suite
                .reporter()
                .record(TestReport::skipped(UI_MIRROR, format!("browser unavailable: {e}")));
            return Ok(());
        }
    };
    let browser = session.browser()?;
    suite
        .run_ui(UI_MIRROR, browser, |ctx| {
            let session = &session;
            async move {
                let token = session.login_api(user).await?;
                session.mirror_token_to_browser().await?;
                let navbar = NavBar::new(session.browser()?);
                navbar.wait_until_loaded().await?;
                ctx.check(navbar.is_logged_in().await?, "navbar shows the signed-in user")?;
                let agreed = session.reconcile().await?;
                ctx.check_eq(&agreed, &token, "token agreed by both channels")
            }
        })
        .await?;
    session.close().await?;
    Ok(())
}

#[cfg(not(feature = "browser"))]
async fn run_ui_scenario(suite: &Suite, _config: &EnvironmentConfig, _user: &str) -> CliResult<()> {
    suite.reporter().record(TestReport::skipped(
        UI_MIRROR,
        "built without the `browser` feature",
    ));
    Ok(())
}
