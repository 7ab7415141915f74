//! Per-site table creation.
//!
//! Each site owns its own SQLite database file, attached to a working
//! connection as schema `site_<id>` for the duration of that site's unit of
//! work. Template tables live in a separate database attached as `tmpl`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use heatmap_core::SiteId;
use rusqlite::{Connection, OptionalExtension};
use tracing::{debug, info, warn};

use crate::error::{ProvisionError, Result};

/// Schema alias of the attached template database.
const TEMPLATE_SCHEMA: &str = "tmpl";

/// Backend that can clone template tables into a site's namespace.
///
/// Calls for one site are bracketed by [`begin`](SiteTables::begin) and either
/// [`commit`](SiteTables::commit) or [`rollback`](SiteTables::rollback).
pub trait SiteTables {
    fn begin(&mut self, site: SiteId) -> Result<()>;

    /// Create `table` shaped like `template` unless it already exists.
    fn create_like(&mut self, site: SiteId, table: &str, template: &str) -> Result<()>;

    fn commit(&mut self, site: SiteId) -> Result<()>;

    /// Discard the open unit of work. Never fails; problems are logged.
    fn rollback(&mut self, site: SiteId);
}

/// SQLite implementation of [`SiteTables`].
pub struct SqliteSiteTables {
    conn: Connection,
    sites_dir: PathBuf,
    attached: Option<SiteId>,
}

impl SqliteSiteTables {
    /// Attach `template_db` and prepare to write site databases under `sites_dir`.
    pub fn open(template_db: &Path, sites_dir: &Path, busy_timeout: Duration) -> Result<Self> {
        // ATTACH would silently create an empty file.
        if !template_db.is_file() {
            return Err(ProvisionError::TemplateDbMissing {
                path: template_db.display().to_string(),
            });
        }
        std::fs::create_dir_all(sites_dir)?;

        let conn = Connection::open_in_memory()?;
        conn.busy_timeout(busy_timeout)?;
        conn.execute(
            &format!("ATTACH DATABASE ?1 AS {TEMPLATE_SCHEMA}"),
            [template_db.to_string_lossy().into_owned()],
        )?;
        info!(template_db = %template_db.display(), sites_dir = %sites_dir.display(), "site table backend ready");

        Ok(Self {
            conn,
            sites_dir: sites_dir.to_path_buf(),
            attached: None,
        })
    }

    /// Database file holding `site`'s tables.
    pub fn site_db_path(&self, site: SiteId) -> PathBuf {
        self.sites_dir.join(format!("{site}.db"))
    }

    fn detach(&mut self, site: SiteId) {
        if self.attached.take().is_some() {
            let sql = format!("DETACH DATABASE {}", quote_ident(&site.schema_alias()));
            if let Err(e) = self.conn.execute_batch(&sql) {
                warn!(site_id = %site, error = %e, "detach failed");
            }
        }
    }

    fn template_ddl(&self, kind: &str, name: &str) -> Result<Vec<(String, String)>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT name, sql FROM {TEMPLATE_SCHEMA}.sqlite_master
             WHERE type = ?1 AND tbl_name = ?2 AND sql IS NOT NULL
             ORDER BY name"
        ))?;
        let rows = stmt
            .query_map([kind, name], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}

impl SiteTables for SqliteSiteTables {
    fn begin(&mut self, site: SiteId) -> Result<()> {
        if let Some(previous) = self.attached {
            warn!(site_id = %previous, "previous site left attached; rolling back");
            self.rollback(previous);
        }

        let path = self.site_db_path(site);
        self.conn.execute(
            &format!("ATTACH DATABASE ?1 AS {}", quote_ident(&site.schema_alias())),
            [path.to_string_lossy().into_owned()],
        )?;
        self.attached = Some(site);

        if let Err(e) = self.conn.execute_batch("BEGIN") {
            self.detach(site);
            return Err(e.into());
        }
        debug!(site_id = %site, path = %path.display(), "site database attached");
        Ok(())
    }

    fn create_like(&mut self, site: SiteId, table: &str, template: &str) -> Result<()> {
        check_ident(table)?;
        check_ident(template)?;
        let schema = quote_ident(&site.schema_alias());

        let table_sql: Option<String> = self
            .conn
            .query_row(
                &format!(
                    "SELECT sql FROM {TEMPLATE_SCHEMA}.sqlite_master
                     WHERE type = 'table' AND name = ?1"
                ),
                [template],
                |row| row.get(0),
            )
            .optional()?;
        let table_sql = table_sql.ok_or_else(|| ProvisionError::TemplateMissing {
            template: template.to_string(),
        })?;

        let columns = definition_after(&table_sql, template)?;
        self.conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {schema}.{} {columns}",
            quote_ident(table)
        ))?;

        for (index_name, index_sql) in self.template_ddl("index", template)? {
            let unique = index_sql
                .trim_start()
                .to_ascii_uppercase()
                .starts_with("CREATE UNIQUE");
            let indexed = definition_after(&index_sql, template)?;
            self.conn.execute_batch(&format!(
                "CREATE {}INDEX IF NOT EXISTS {schema}.{} ON {} {indexed}",
                if unique { "UNIQUE " } else { "" },
                quote_ident(&format!("{table}__{index_name}")),
                quote_ident(table),
            ))?;
        }

        debug!(site_id = %site, table, template, "table ensured");
        Ok(())
    }

    fn commit(&mut self, site: SiteId) -> Result<()> {
        self.conn.execute_batch("COMMIT")?;
        self.detach(site);
        Ok(())
    }

    fn rollback(&mut self, site: SiteId) {
        if !self.conn.is_autocommit() {
            if let Err(e) = self.conn.execute_batch("ROLLBACK") {
                warn!(site_id = %site, error = %e, "rollback failed");
            }
        }
        self.detach(site);
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn check_ident(name: &str) -> Result<()> {
    let ok = !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if ok {
        Ok(())
    } else {
        Err(ProvisionError::InvalidTableName(name.to_string()))
    }
}

/// The part of a `CREATE TABLE <name> (...)` or `CREATE INDEX .. ON <name> (...)`
/// statement from the opening parenthesis on.
fn definition_after<'a>(sql: &'a str, template: &str) -> Result<&'a str> {
    let invalid = |reason: &str| ProvisionError::InvalidTemplate {
        template: template.to_string(),
        reason: reason.to_string(),
    };
    let open = sql.find('(').ok_or_else(|| invalid("no column list"))?;
    let head = sql[..open]
        .trim_end()
        .trim_end_matches(['"', '`', ']'])
        .to_ascii_lowercase();
    if !head.ends_with(&template.to_ascii_lowercase()) {
        return Err(invalid("unexpected text before column list"));
    }
    Ok(&sql[open..])
}
