// shopsync/src/overrides/mod.rs
//! Post-import rewriting of the freshly copied database so it answers to the
//! local development identity instead of the remote one.

pub mod post_sync;
pub mod system_config;

use sqlx::MySqlPool;

use crate::config::overrides_file::OverrideFile;
use crate::config::{DomainMapping, LocalSettings};
use crate::errors::Result;
use crate::overrides::system_config::IdGenerator;

/// Configuration key of the application's public URL entry.
pub const PUBLIC_URL_CONFIG_KEY: &str = "core.app.appUrl";

/// Where the overrides come from, decided once per run. The declarative file
/// is authoritative when present; environment mappings are ignored entirely
/// in that case.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverrideSource {
    ConfigFile,
    Environment,
    Disabled,
}

/// Pure selection function of the two-state priority switch.
pub fn select_override_source(
    file_present: bool,
    has_mappings: bool,
    has_local_domain: bool,
) -> OverrideSource {
    if file_present {
        OverrideSource::ConfigFile
    } else if has_mappings || has_local_domain {
        OverrideSource::Environment
    } else {
        OverrideSource::Disabled
    }
}

/// What the engine did, for the final summary. Individual failures land in
/// `warnings`; only file-level problems abort the engine.
#[derive(Debug, Default)]
pub struct OverrideReport {
    pub source: Option<OverrideSource>,
    pub domain_rows_updated: u64,
    pub fallback_applied: bool,
    pub config_entries_applied: usize,
    pub sql_statements_applied: usize,
    pub warnings: Vec<String>,
}

/// Strips a scheme and trailing slash, leaving the bare domain.
fn bare_domain(value: &str) -> String {
    value
        .trim()
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .trim_end_matches('/')
        .to_string()
}

/// `https://` is assumed for declared domains without an explicit scheme.
fn ensure_scheme(value: &str) -> String {
    if value.contains("://") {
        value.trim_end_matches('/').to_string()
    } else {
        format!("https://{}", value.trim_end_matches('/'))
    }
}

/// The six stored spellings a mapping rule matches: https/http/bare, each
/// with and without a trailing slash.
pub fn candidate_urls(from: &str) -> Vec<String> {
    let bare = bare_domain(from);
    vec![
        format!("https://{bare}"),
        format!("https://{bare}/"),
        format!("http://{bare}"),
        format!("http://{bare}/"),
        bare.clone(),
        format!("{bare}/"),
    ]
}

/// Fallback only fires when no mapping rule changed anything and a local
/// domain is configured to fall back to.
pub fn should_apply_fallback(mapped_rows: u64, local_domain: Option<&str>) -> bool {
    mapped_rows == 0 && local_domain.is_some_and(|domain| !domain.is_empty())
}

/// Applies the override stage. `file` is the freshly loaded declarative file
/// (None when absent), `local` carries the environment-derived mappings.
pub async fn apply_overrides(
    pool: &MySqlPool,
    local: &LocalSettings,
    file: Option<&OverrideFile>,
    ids: &dyn IdGenerator,
) -> Result<OverrideReport> {
    let source = select_override_source(
        file.is_some(),
        !local.domain_mappings.is_empty(),
        local.local_domain.is_some(),
    );

    let mut report = OverrideReport {
        source: Some(source),
        ..OverrideReport::default()
    };

    let primary_domain = match (source, file) {
        (OverrideSource::ConfigFile, Some(file)) => {
            println!("🔧 Applying overrides from declarative file...");
            apply_file_overrides(pool, file, ids, &mut report).await?
        }
        (OverrideSource::Environment, _) => {
            println!("🔧 Applying environment-derived domain overrides...");
            apply_env_overrides(pool, local, &mut report).await?
        }
        _ => {
            println!("ℹ️  No override source configured, database left as imported.");
            return Ok(report);
        }
    };

    let public_domain = primary_domain.or_else(|| local.local_domain.as_ref().map(|d| bare_domain(d)));
    match public_domain {
        Some(domain) => {
            let url = format!("https://{domain}");
            println!("🔧 Setting {PUBLIC_URL_CONFIG_KEY} to {url}...");
            if let Err(e) = system_config::upsert(
                pool,
                ids,
                PUBLIC_URL_CONFIG_KEY,
                &serde_json::Value::String(url),
                None,
            )
            .await
            {
                report
                    .warnings
                    .push(format!("failed to set {PUBLIC_URL_CONFIG_KEY}: {e}"));
            }
        }
        None => {
            println!("ℹ️  No domain known, leaving {PUBLIC_URL_CONFIG_KEY} untouched.");
        }
    }

    Ok(report)
}

/// Environment state: explicit from->to rules first, then the coarse
/// fallback rewrite when nothing matched.
async fn apply_env_overrides(
    pool: &MySqlPool,
    local: &LocalSettings,
    report: &mut OverrideReport,
) -> Result<Option<String>> {
    for mapping in &local.domain_mappings {
        match apply_domain_mapping(pool, mapping).await {
            Ok(rows) => {
                println!(
                    "✓ Mapped {} -> {} ({rows} row{})",
                    mapping.from,
                    mapping.to,
                    if rows == 1 { "" } else { "s" }
                );
                report.domain_rows_updated += rows;
            }
            Err(e) => report.warnings.push(format!(
                "domain mapping {} -> {} failed: {e}",
                mapping.from, mapping.to
            )),
        }
    }

    if should_apply_fallback(report.domain_rows_updated, local.local_domain.as_deref()) {
        if let Some(domain) = &local.local_domain {
            let bare = bare_domain(domain);
            match apply_fallback_domain(pool, &bare).await {
                Ok(rows) => {
                    println!("✓ Fallback rewrote {rows} domain row(s) to https://{bare}");
                    report.fallback_applied = true;
                    report.domain_rows_updated += rows;
                }
                Err(e) => report
                    .warnings
                    .push(format!("fallback domain rewrite failed: {e}")),
            }
        }
    }

    Ok(local
        .domain_mappings
        .first()
        .map(|mapping| bare_domain(&mapping.to)))
}

async fn apply_domain_mapping(pool: &MySqlPool, mapping: &DomainMapping) -> Result<u64> {
    let target = format!("https://{}", bare_domain(&mapping.to));
    let mut query =
        sqlx::query("UPDATE sales_channel_domain SET url = ? WHERE url IN (?, ?, ?, ?, ?, ?)")
            .bind(target);
    for candidate in candidate_urls(&mapping.from) {
        query = query.bind(candidate);
    }
    Ok(query.execute(pool).await?.rows_affected())
}

/// Substring heuristic by contract: URLs already containing the domain
/// anywhere are left untouched.
async fn apply_fallback_domain(pool: &MySqlPool, bare: &str) -> Result<u64> {
    let result = sqlx::query("UPDATE sales_channel_domain SET url = ? WHERE url NOT LIKE ?")
        .bind(format!("https://{bare}"))
        .bind(format!("%{bare}%"))
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

/// ConfigFile state: channel domains, then config upserts, then raw SQL,
/// each entry independently caught.
async fn apply_file_overrides(
    pool: &MySqlPool,
    file: &OverrideFile,
    ids: &dyn IdGenerator,
    report: &mut OverrideReport,
) -> Result<Option<String>> {
    let mut primary_domain = None;

    for (channel_id, domain) in &file.sales_channel_domains {
        let url = ensure_scheme(domain);
        match apply_channel_domain(pool, channel_id, &url).await {
            Ok(rows) => {
                println!("✓ Channel {channel_id} -> {url} ({rows} row(s))");
                report.domain_rows_updated += rows;
                if primary_domain.is_none() {
                    primary_domain = Some(bare_domain(&url));
                }
            }
            Err(e) => report
                .warnings
                .push(format!("channel domain {channel_id} failed: {e}")),
        }
    }

    for (key, entry) in &file.system_config {
        match system_config::upsert(pool, ids, key, entry.value(), entry.scope_id()).await {
            Ok(()) => {
                println!("✓ Config {key} applied");
                report.config_entries_applied += 1;
            }
            Err(e) => report.warnings.push(format!("config {key} failed: {e}")),
        }
    }

    for statement in &file.sql_updates {
        let statement = statement.trim();
        if statement.is_empty() {
            continue;
        }
        match sqlx::query(statement).execute(pool).await {
            Ok(result) => {
                println!(
                    "✓ SQL update applied ({} row(s)): {}",
                    result.rows_affected(),
                    summarize(statement)
                );
                report.sql_statements_applied += 1;
            }
            Err(e) => {
                eprintln!("⚠️  SQL update failed, continuing: {}", summarize(statement));
                report
                    .warnings
                    .push(format!("sql update {:?} failed: {e}", summarize(statement)));
            }
        }
    }

    Ok(primary_domain)
}

async fn apply_channel_domain(pool: &MySqlPool, channel_id: &str, url: &str) -> Result<u64> {
    if hex::decode(channel_id).map(|bytes| bytes.len() != 16).unwrap_or(true) {
        return Err(crate::errors::SyncError::Override(format!(
            "sales channel id {channel_id:?} is not a 16-byte hex identifier"
        )));
    }
    let result = sqlx::query("UPDATE sales_channel_domain SET url = ? WHERE sales_channel_id = UNHEX(?)")
        .bind(url)
        .bind(channel_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

fn summarize(statement: &str) -> &str {
    let end = statement
        .char_indices()
        .nth(60)
        .map(|(i, _)| i)
        .unwrap_or(statement.len());
    &statement[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_presence_wins_over_environment_settings() {
        assert_eq!(
            select_override_source(true, true, true),
            OverrideSource::ConfigFile
        );
        assert_eq!(
            select_override_source(true, false, false),
            OverrideSource::ConfigFile
        );
    }

    #[test]
    fn environment_state_needs_mappings_or_domain() {
        assert_eq!(
            select_override_source(false, true, false),
            OverrideSource::Environment
        );
        assert_eq!(
            select_override_source(false, false, true),
            OverrideSource::Environment
        );
        assert_eq!(
            select_override_source(false, false, false),
            OverrideSource::Disabled
        );
    }

    #[test]
    fn candidate_urls_cover_scheme_and_slash_variants() {
        assert_eq!(
            candidate_urls("old.com"),
            vec![
                "https://old.com",
                "https://old.com/",
                "http://old.com",
                "http://old.com/",
                "old.com",
                "old.com/",
            ]
        );
    }

    #[test]
    fn candidate_urls_normalize_declared_scheme_and_slash() {
        // A mapping declared as a URL still matches the stored spellings.
        assert_eq!(candidate_urls("https://old.com/"), candidate_urls("old.com"));
    }

    #[test]
    fn fallback_fires_only_on_zero_mapped_rows() {
        assert!(should_apply_fallback(0, Some("shop.local")));
        assert!(!should_apply_fallback(3, Some("shop.local")));
        assert!(!should_apply_fallback(0, None));
        assert!(!should_apply_fallback(0, Some("")));
    }

    #[test]
    fn ensure_scheme_prefixes_https_only_when_missing() {
        assert_eq!(ensure_scheme("shop.local"), "https://shop.local");
        assert_eq!(ensure_scheme("http://shop.local"), "http://shop.local");
        assert_eq!(ensure_scheme("https://shop.local/"), "https://shop.local");
    }

    #[test]
    fn bare_domain_strips_scheme_and_slash() {
        assert_eq!(bare_domain("https://shop.local/"), "shop.local");
        assert_eq!(bare_domain("shop.local"), "shop.local");
    }

    #[test]
    fn summarize_truncates_long_statements() {
        let long = "UPDATE x SET y = 1 WHERE ".repeat(10);
        assert_eq!(summarize(&long).len(), 60);
        assert_eq!(summarize("short"), "short");
    }
}
