//! Informational pages
//!
//! Each page is an HTML template read from the templates directory. Policy
//! pages additionally get the last-updated and effective dates filled in.

use chrono::{NaiveDate, TimeDelta};
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::Response;
use std::io;
use std::path::Path;
use tokio::fs;

use crate::handler::router::RequestContext;
use crate::http;
use crate::logger;

/// Date the policy texts were last revised
pub const POLICY_UPDATED: NaiveDate = match NaiveDate::from_ymd_opt(2025, 5, 29) {
    Some(date) => date,
    None => panic!("policy revision date is not a calendar date"),
};

/// Days between a policy revision and the date it takes effect
pub const POLICY_NOTICE_DAYS: i64 = 14;

/// Page routes served from templates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Home,
    About,
    PrivacyPolicy,
    TermsOfService,
    CookiePolicy,
    Chatbot,
}

impl Page {
    pub const ALL: [Self; 6] = [
        Self::Home,
        Self::About,
        Self::PrivacyPolicy,
        Self::TermsOfService,
        Self::CookiePolicy,
        Self::Chatbot,
    ];

    pub fn from_path(path: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|page| page.path() == path)
    }

    pub const fn path(self) -> &'static str {
        match self {
            Self::Home => "/",
            Self::About => "/about",
            Self::PrivacyPolicy => "/privacy-policy",
            Self::TermsOfService => "/terms-of-service",
            Self::CookiePolicy => "/cookie-policy",
            Self::Chatbot => "/mental-health-chatbot",
        }
    }

    /// Template file, relative to the templates directory
    pub const fn template(self) -> &'static str {
        match self {
            Self::Home => "home.html",
            Self::About => "about.html",
            Self::PrivacyPolicy => "policy-pages/privacy-policy.html",
            Self::TermsOfService => "policy-pages/terms-of-service.html",
            Self::CookiePolicy => "policy-pages/cookie-policy.html",
            Self::Chatbot => "mental-health-chatbot.html",
        }
    }

    pub const fn shows_policy_dates(self) -> bool {
        matches!(
            self,
            Self::PrivacyPolicy | Self::TermsOfService | Self::CookiePolicy
        )
    }
}

/// Revision and effective dates shown on every policy page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolicyDates {
    pub updated: NaiveDate,
    pub effective: NaiveDate,
}

impl PolicyDates {
    pub fn current() -> Self {
        Self {
            updated: POLICY_UPDATED,
            effective: POLICY_UPDATED + TimeDelta::days(POLICY_NOTICE_DAYS),
        }
    }

    /// Substitute the date placeholders in `template`
    ///
    /// `{{ date_updated }}` and `{{ date_effective }}` become e.g. "May 29, 2025";
    /// the `_iso` variants become "2025-05-29".
    pub fn fill(&self, template: &str) -> String {
        template
            .replace("{{ date_updated }}", &long_date(self.updated))
            .replace("{{ date_effective }}", &long_date(self.effective))
            .replace("{{ date_updated_iso }}", &self.updated.to_string())
            .replace("{{ date_effective_iso }}", &self.effective.to_string())
    }
}

fn long_date(date: NaiveDate) -> String {
    date.format("%B %-d, %Y").to_string()
}

/// Read and fill the template for `page`
pub async fn render(templates_dir: &str, page: Page) -> io::Result<String> {
    let path = Path::new(templates_dir).join(page.template());
    let template = fs::read_to_string(&path).await?;

    if page.shows_policy_dates() {
        Ok(PolicyDates::current().fill(&template))
    } else {
        Ok(template)
    }
}

/// Serve a rendered page
pub async fn serve_page(
    ctx: &RequestContext<'_>,
    templates_dir: &str,
    page: Page,
) -> Response<Full<Bytes>> {
    match render(templates_dir, page).await {
        Ok(html) => http::build_html_response(html, ctx.is_head),
        Err(e) => {
            logger::log_error(&format!(
                "Failed to render template '{}' from '{templates_dir}': {e}",
                page.template()
            ));
            http::build_500_response()
        }
    }
}
