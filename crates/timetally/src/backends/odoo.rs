//! 🏢 The Odoo backend — timesheets over XML-RPC, one page at a time.
//!
//! 🎬 *[the ERP wakes up. it has been asked for `account.analytic.line` again.]*
//! *[it sighs in PostgreSQL.]*
//!
//! Two endpoints:
//! - `/xmlrpc/2/common` for `authenticate`, once per run
//! - `/xmlrpc/2/object` for `execute_kw` (`search_count`, `search_read`, `create`)
//!
//! Every object call re-sends db/uid/password. Stateless, like a goldfish with a badge.

use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use chrono::NaiveDate;
use tracing::{debug, info};

use crate::app_config::OdooConfig;
use crate::backends::TimesheetSource;
use crate::common::{Relation, TimesheetDraft, TimesheetEntry};
use crate::period::DateRange;
use crate::xmlrpc::{Value, XmlRpcClient};

const TIMESHEET_MODEL: &str = "account.analytic.line";
const TIMESHEET_FIELDS: [&str; 5] = ["date", "employee_id", "project_id", "name", "unit_amount"];

/// 📡 An authenticated session against one Odoo database.
#[derive(Debug)]
pub(crate) struct OdooSource {
    config: OdooConfig,
    object: XmlRpcClient,
    uid: i64,
}

impl OdooSource {
    /// 🚀 Build the HTTP client, authenticate, and keep the uid for every call after.
    ///
    /// `request_timeout` bounds each individual HTTP round trip. The per-page fetch timeout
    /// upstream is a separate, outer fence.
    ///
    /// 💀 Rejected credentials are fatal. There is no "maybe later" with a password.
    pub(crate) async fn connect(config: OdooConfig, request_timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(request_timeout)
            .build()
            .context("💀 The HTTP client refused to be born. Probably TLS. It's always TLS.")?;

        let common = XmlRpcClient::new(http.clone(), config.common_url());
        let answer = common
            .call(
                "authenticate",
                &[
                    config.db.as_str().into(),
                    config.username.as_str().into(),
                    config.password.as_str().into(),
                    Value::Struct(BTreeMap::new()),
                ],
            )
            .await
            .with_context(|| {
                format!(
                    "💀 Could not reach the authentication endpoint at '{}'",
                    common.endpoint()
                )
            })?;

        let uid = match answer {
            Value::Int(uid) => uid,
            Value::Bool(false) => bail!(
                "💀 Odoo rejected the credentials for user '{}' on database '{}'. \
                 Check ODOO_USERNAME and ODOO_PASSWORD.",
                config.username,
                config.db
            ),
            other => bail!("💀 authenticate returned something that is not a uid: {other:?}"),
        };
        info!("🔒 authenticated as '{}' (uid {uid})", config.username);

        let object = XmlRpcClient::new(http, config.object_url());
        Ok(Self {
            config,
            object,
            uid,
        })
    }

    /// 📨 `execute_kw(db, uid, password, model, method, args, kwargs)`.
    async fn execute_kw(
        &self,
        model: &str,
        method: &str,
        args: Vec<Value>,
        kwargs: Value,
    ) -> Result<Value> {
        let value = self
            .object
            .call(
                "execute_kw",
                &[
                    self.config.db.as_str().into(),
                    self.uid.into(),
                    self.config.password.as_str().into(),
                    model.into(),
                    method.into(),
                    Value::Array(args),
                    kwargs,
                ],
            )
            .await
            .with_context(|| format!("💀 {model}.{method} failed"))?;
        Ok(value)
    }

    /// ✍️ Create one timesheet line from a chat draft. Returns the new record id.
    ///
    /// The project is looked up by case-insensitive partial name, first match wins.
    /// The task, when given, must belong to that project.
    pub(crate) async fn create_entry(&self, draft: &TimesheetDraft) -> Result<i64> {
        let project_id = self
            .find_project_id(&draft.project)
            .await
            .with_context(|| format!("💀 project '{}' not found", draft.project))?;

        let task_id = match &draft.task {
            Some(task) => Some(
                self.find_task_id(project_id, task)
                    .await
                    .with_context(|| format!("💀 task '{task}' not found"))?,
            ),
            None => None,
        };

        let mut values: BTreeMap<String, Value> = BTreeMap::from([
            ("date".to_string(), draft.date.format("%Y-%m-%d").to_string().into()),
            ("name".to_string(), draft.description.as_str().into()),
            ("unit_amount".to_string(), draft.hours.into()),
            ("project_id".to_string(), project_id.into()),
        ]);
        if let Some(task_id) = task_id {
            values.insert("task_id".to_string(), task_id.into());
        }

        let created = self
            .execute_kw(
                TIMESHEET_MODEL,
                "create",
                vec![Value::Struct(values)],
                Value::Struct(BTreeMap::new()),
            )
            .await?;
        let id = created
            .as_i64()
            .ok_or_else(|| anyhow!("💀 create returned {created:?} instead of a record id"))?;
        info!(
            "✍️ created timesheet line {id}: {} on '{}' ({:.2}h)",
            draft.date, draft.project, draft.hours
        );
        Ok(id)
    }

    async fn find_project_id(&self, name: &str) -> Result<i64> {
        let domain = vec![triple("name", "ilike", name.into())];
        self.first_id("project.project", domain).await
    }

    async fn find_task_id(&self, project_id: i64, name: &str) -> Result<i64> {
        let domain = vec![
            triple("name", "ilike", name.into()),
            triple("project_id", "=", project_id.into()),
        ];
        self.first_id("project.task", domain).await
    }

    /// 🔎 `search_read(domain, fields=[id, name], limit=1)` and pull out the id.
    async fn first_id(&self, model: &str, domain: Vec<Value>) -> Result<i64> {
        let kwargs = Value::structure([
            ("fields", Value::Array(vec!["id".into(), "name".into()])),
            ("limit", Value::Int(1)),
        ]);
        let found = self
            .execute_kw(model, "search_read", vec![Value::Array(domain)], kwargs)
            .await?;
        let first = found
            .as_array()
            .and_then(|records| records.first())
            .ok_or_else(|| anyhow!("💀 no {model} record matched"))?;
        first
            .get("id")
            .and_then(Value::as_i64)
            .ok_or_else(|| anyhow!("💀 {model} record without a usable id: {first:?}"))
    }
}

#[async_trait]
impl TimesheetSource for OdooSource {
    async fn count(&self, range: &DateRange) -> Result<usize> {
        let total = self
            .execute_kw(
                TIMESHEET_MODEL,
                "search_count",
                vec![date_domain(range)],
                Value::Struct(BTreeMap::new()),
            )
            .await?;
        let total = total
            .as_i64()
            .ok_or_else(|| anyhow!("💀 search_count returned {total:?} instead of a number"))?;
        usize::try_from(total).context("💀 search_count returned a negative count")
    }

    async fn fetch_page(
        &self,
        range: &DateRange,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<TimesheetEntry>> {
        let kwargs = Value::structure([
            (
                "fields",
                Value::Array(TIMESHEET_FIELDS.iter().map(|f| (*f).into()).collect()),
            ),
            ("limit", limit.into()),
            ("offset", offset.into()),
        ]);
        let records = self
            .execute_kw(TIMESHEET_MODEL, "search_read", vec![date_domain(range)], kwargs)
            .await?;
        let records = records
            .as_array()
            .ok_or_else(|| anyhow!("💀 search_read at offset {offset} did not return a list"))?;

        let entries = records
            .iter()
            .map(decode_entry)
            .collect::<Result<Vec<_>>>()
            .with_context(|| format!("💀 page at offset {offset} failed to decode"))?;
        debug!("📄 offset {offset}: {} entries", entries.len());
        Ok(entries)
    }
}

/// 🧱 `[field, operator, value]`, the atom of every Odoo domain.
fn triple(field: &str, operator: &str, value: Value) -> Value {
    Value::Array(vec![field.into(), operator.into(), value])
}

/// 📅 `date >= start AND date <= end`, both inclusive.
fn date_domain(range: &DateRange) -> Value {
    Value::Array(vec![
        triple(
            "date",
            ">=",
            range.start.format("%Y-%m-%d").to_string().into(),
        ),
        triple("date", "<=", range.end.format("%Y-%m-%d").to_string().into()),
    ])
}

/// 🔗 `[id, "Name"]` becomes a relation. `false`, or any other shape, becomes `None`.
fn decode_relation(value: Option<&Value>) -> Option<Relation> {
    match value?.as_array()? {
        [id, name] => Some(Relation {
            id: id.as_i64()?,
            name: name.as_str()?.to_string(),
        }),
        _ => None,
    }
}

/// 🧬 One `search_read` record into a [`TimesheetEntry`].
///
/// A missing or malformed date fails the record (and with it, the page).
/// Relations and descriptions never fail: they degrade to unset and empty.
fn decode_entry(record: &Value) -> Result<TimesheetEntry> {
    let raw_date = record
        .get("date")
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow!("💀 record without a date: {record:?}"))?;
    let date = NaiveDate::parse_from_str(raw_date, "%Y-%m-%d")
        .with_context(|| format!("💀 '{raw_date}' is not a YYYY-MM-DD date"))?;
    let hours = record
        .get("unit_amount")
        .and_then(Value::as_f64)
        .ok_or_else(|| anyhow!("💀 record on {date} without a numeric unit_amount"))?;

    Ok(TimesheetEntry {
        date,
        employee: decode_relation(record.get("employee_id")),
        project: decode_relation(record.get("project_id")),
        description: record
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        hours,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::fixtures::day;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn respond(value_xml: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_string(format!(
            "<?xml version='1.0'?><methodResponse><params><param><value>{value_xml}</value></param></params></methodResponse>"
        ))
    }

    fn config(server: &MockServer) -> OdooConfig {
        OdooConfig {
            base_url: server.uri(),
            db: "prod".into(),
            username: "reports".into(),
            password: "hunter2".into(),
        }
    }

    async fn mount_auth(server: &MockServer, answer: &str) {
        Mock::given(method("POST"))
            .and(path("/xmlrpc/2/common"))
            .and(body_string_contains("<methodName>authenticate</methodName>"))
            .respond_with(respond(answer))
            .mount(server)
            .await;
    }

    fn october() -> DateRange {
        DateRange {
            start: day("2026-10-01"),
            end: day("2026-10-19"),
        }
    }

    fn record_xml(date: &str, employee: &str, project: &str, name: &str, hours: &str) -> String {
        format!(
            "<struct>\
             <member><name>id</name><value><int>1</int></value></member>\
             <member><name>date</name><value><string>{date}</string></value></member>\
             <member><name>employee_id</name><value>{employee}</value></member>\
             <member><name>project_id</name><value>{project}</value></member>\
             <member><name>name</name><value>{name}</value></member>\
             <member><name>unit_amount</name><value>{hours}</value></member>\
             </struct>"
        )
    }

    #[tokio::test]
    async fn the_one_where_false_means_go_away() {
        let server = MockServer::start().await;
        mount_auth(&server, "<boolean>0</boolean>").await;

        let err = OdooSource::connect(config(&server), Duration::from_secs(5))
            .await
            .expect_err("💀 a false uid must not authenticate");
        assert!(format!("{err:#}").contains("rejected the credentials"));
    }

    #[tokio::test]
    async fn the_one_where_count_asks_for_the_date_range() -> Result<()> {
        let server = MockServer::start().await;
        mount_auth(&server, "<int>7</int>").await;
        Mock::given(method("POST"))
            .and(path("/xmlrpc/2/object"))
            .and(body_string_contains("<string>search_count</string>"))
            .and(body_string_contains("<string>2026-10-01</string>"))
            .and(body_string_contains("<string>2026-10-19</string>"))
            .respond_with(respond("<int>250</int>"))
            .expect(1)
            .mount(&server)
            .await;

        let source = OdooSource::connect(config(&server), Duration::from_secs(5)).await?;
        assert_eq!(source.count(&october()).await?, 250);
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_a_page_decodes_relations_the_forgiving_way() -> Result<()> {
        let server = MockServer::start().await;
        mount_auth(&server, "<int>7</int>").await;
        let linked = "<array><data><value><int>4</int></value><value><string>Ada Lovelace</string></value></data></array>";
        let project = "<array><data><value><int>9</int></value><value><string>Engine</string></value></data></array>";
        let weird = "<array><data><value><int>5</int></value></data></array>";
        let records = format!(
            "<array><data><value>{}</value><value>{}</value></data></array>",
            record_xml("2026-10-02", linked, project, "<string>Gears</string>", "<double>7.5</double>"),
            record_xml("2026-10-03", weird, "<boolean>0</boolean>", "<boolean>0</boolean>", "<int>2</int>"),
        );
        Mock::given(method("POST"))
            .and(path("/xmlrpc/2/object"))
            .and(body_string_contains("<string>search_read</string>"))
            .and(body_string_contains("<name>offset</name><value><int>100</int></value>"))
            .respond_with(respond(&records))
            .expect(1)
            .mount(&server)
            .await;

        let source = OdooSource::connect(config(&server), Duration::from_secs(5)).await?;
        let page = source.fetch_page(&october(), 100, 100).await?;

        assert_eq!(page.len(), 2);
        assert_eq!(page[0].employee_name(), "Ada Lovelace");
        assert_eq!(page[0].project_name(), "Engine");
        assert_eq!(page[0].description, "Gears");
        assert_eq!(page[0].hours, 7.5);
        assert_eq!(page[1].employee, None);
        assert_eq!(page[1].project, None);
        assert_eq!(page[1].description, "");
        assert_eq!(page[1].hours, 2.0);
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_a_bad_date_sinks_the_whole_page() -> Result<()> {
        let server = MockServer::start().await;
        mount_auth(&server, "<int>7</int>").await;
        let records = format!(
            "<array><data><value>{}</value></data></array>",
            record_xml("last tuesday", "<boolean>0</boolean>", "<boolean>0</boolean>", "<string>?</string>", "<double>1.0</double>"),
        );
        Mock::given(method("POST"))
            .and(path("/xmlrpc/2/object"))
            .respond_with(respond(&records))
            .mount(&server)
            .await;

        let source = OdooSource::connect(config(&server), Duration::from_secs(5)).await?;
        let err = source
            .fetch_page(&october(), 0, 100)
            .await
            .expect_err("💀 'last tuesday' is not a date");
        assert!(format!("{err:#}").contains("offset 0"));
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_a_chat_draft_becomes_a_timesheet_line() -> Result<()> {
        let server = MockServer::start().await;
        mount_auth(&server, "<int>7</int>").await;
        let found = |id: i64| {
            format!(
                "<array><data><value><struct>\
                 <member><name>id</name><value><int>{id}</int></value></member>\
                 </struct></value></data></array>"
            )
        };
        Mock::given(method("POST"))
            .and(body_string_contains("<string>project.project</string>"))
            .and(body_string_contains("<string>APOLLO</string>"))
            .respond_with(respond(&found(31)))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_string_contains("<string>project.task</string>"))
            .and(body_string_contains("<string>CX-7006</string>"))
            .and(body_string_contains("<int>31</int>"))
            .respond_with(respond(&found(77)))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_string_contains("<string>create</string>"))
            .and(body_string_contains("<name>task_id</name><value><int>77</int></value>"))
            .and(body_string_contains("<name>project_id</name><value><int>31</int></value>"))
            .respond_with(respond("<int>1001</int>"))
            .expect(1)
            .mount(&server)
            .await;

        let source = OdooSource::connect(config(&server), Duration::from_secs(5)).await?;
        let draft = TimesheetDraft {
            date: day("2026-10-19"),
            project: "APOLLO".into(),
            task: Some("CX-7006".into()),
            description: "Fixed the thing".into(),
            hours: 3.5,
        };
        assert_eq!(source.create_entry(&draft).await?, 1001);
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_the_project_does_not_exist() -> Result<()> {
        let server = MockServer::start().await;
        mount_auth(&server, "<int>7</int>").await;
        Mock::given(method("POST"))
            .and(body_string_contains("<string>project.project</string>"))
            .respond_with(respond("<array><data></data></array>"))
            .mount(&server)
            .await;

        let source = OdooSource::connect(config(&server), Duration::from_secs(5)).await?;
        let draft = TimesheetDraft {
            date: day("2026-10-19"),
            project: "NOPE".into(),
            task: None,
            description: "ghost work".into(),
            hours: 1.0,
        };
        let err = source.create_entry(&draft).await.expect_err("💀 no project, no line");
        assert!(format!("{err:#}").contains("project 'NOPE' not found"));
        Ok(())
    }

    #[test]
    fn the_one_where_only_two_element_relations_survive() {
        let linked = Value::Array(vec![Value::Int(3), "Grace".into()]);
        assert_eq!(
            decode_relation(Some(&linked)),
            Some(Relation {
                id: 3,
                name: "Grace".into()
            })
        );
        assert_eq!(decode_relation(Some(&Value::Bool(false))), None);
        assert_eq!(decode_relation(Some(&Value::Array(vec![Value::Int(3)]))), None);
        assert_eq!(decode_relation(None), None);
    }
}
