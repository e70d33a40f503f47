use chrono::NaiveDateTime;
use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::SubmissionRecord;

pub fn insert_submission(conn: &Connection, record: &SubmissionRecord) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO submissions (id, full_name, email, phone, date_of_birth,
         pain_duration, pain_intensity, pain_start, timeline, consent, ai_summary,
         selected_areas, red_flags, goals, pain_points, raw_form_data, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
        params![
            record.id.to_string(),
            record.full_name,
            record.email,
            record.phone,
            record.date_of_birth,
            record.pain_duration,
            record.pain_intensity,
            record.pain_start,
            record.timeline,
            record.consent as i32,
            record.ai_summary,
            serde_json::to_string(&record.selected_areas)?,
            serde_json::to_string(&record.red_flags)?,
            serde_json::to_string(&record.goals)?,
            record.pain_points.to_string(),
            record.raw_form_data.to_string(),
            record.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        ],
    )?;
    Ok(())
}

struct SubmissionRow {
    id: String,
    full_name: Option<String>,
    email: Option<String>,
    phone: Option<String>,
    date_of_birth: Option<String>,
    pain_duration: Option<String>,
    pain_intensity: Option<u8>,
    pain_start: Option<String>,
    timeline: Option<String>,
    consent: i32,
    ai_summary: Option<String>,
    selected_areas: String,
    red_flags: String,
    goals: String,
    pain_points: String,
    raw_form_data: String,
    created_at: String,
}

const SELECT_COLUMNS: &str = "SELECT id, full_name, email, phone, date_of_birth,
    pain_duration, pain_intensity, pain_start, timeline, consent, ai_summary,
    selected_areas, red_flags, goals, pain_points, raw_form_data, created_at
    FROM submissions";

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<SubmissionRow> {
    Ok(SubmissionRow {
        id: row.get(0)?,
        full_name: row.get(1)?,
        email: row.get(2)?,
        phone: row.get(3)?,
        date_of_birth: row.get(4)?,
        pain_duration: row.get(5)?,
        pain_intensity: row.get(6)?,
        pain_start: row.get(7)?,
        timeline: row.get(8)?,
        consent: row.get(9)?,
        ai_summary: row.get(10)?,
        selected_areas: row.get(11)?,
        red_flags: row.get(12)?,
        goals: row.get(13)?,
        pain_points: row.get(14)?,
        raw_form_data: row.get(15)?,
        created_at: row.get(16)?,
    })
}

fn submission_from_row(row: SubmissionRow) -> Result<SubmissionRecord, DatabaseError> {
    let id = Uuid::parse_str(&row.id).map_err(|_| DatabaseError::NotFound {
        entity_type: "submission".into(),
        id: row.id.clone(),
    })?;
    Ok(SubmissionRecord {
        id,
        full_name: row.full_name,
        email: row.email,
        phone: row.phone,
        date_of_birth: row.date_of_birth,
        pain_duration: row.pain_duration,
        pain_intensity: row.pain_intensity,
        pain_start: row.pain_start,
        timeline: row.timeline,
        consent: row.consent != 0,
        ai_summary: row.ai_summary,
        selected_areas: serde_json::from_str(&row.selected_areas)?,
        red_flags: serde_json::from_str(&row.red_flags)?,
        goals: serde_json::from_str(&row.goals)?,
        pain_points: serde_json::from_str(&row.pain_points)?,
        raw_form_data: serde_json::from_str(&row.raw_form_data)?,
        created_at: NaiveDateTime::parse_from_str(&row.created_at, "%Y-%m-%d %H:%M:%S")
            .unwrap_or_default(),
    })
}

pub fn get_submission(conn: &Connection, id: &Uuid) -> Result<Option<SubmissionRecord>, DatabaseError> {
    let mut stmt = conn.prepare(&format!("{SELECT_COLUMNS} WHERE id = ?1"))?;
    match stmt.query_row(params![id.to_string()], read_row) {
        Ok(row) => submission_from_row(row).map(Some),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(DatabaseError::from(e)),
    }
}

/// Most recent submissions first.
pub fn list_recent_submissions(
    conn: &Connection,
    limit: u32,
) -> Result<Vec<SubmissionRecord>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "{SELECT_COLUMNS} ORDER BY created_at DESC, rowid DESC LIMIT ?1"
    ))?;
    let rows = stmt.query_map(params![limit], read_row)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(submission_from_row(row?)?);
    }
    Ok(out)
}

pub fn count_submissions(conn: &Connection) -> Result<i64, DatabaseError> {
    let count = conn.query_row("SELECT COUNT(*) FROM submissions", [], |row| row.get(0))?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;
    use crate::models::Snapshot;

    fn record(name: &str) -> SubmissionRecord {
        let raw = format!(
            r#"{{"fullName": "{name}", "email": "{name}@example.org",
                "painDuration": "Less than 2 weeks", "painIntensity": "4",
                "goals": ["Reduce pain intensity"], "consent": "on",
                "painPoints": [{{"key": "back:lower-back:Lower Back", "view": "back",
                    "region": "Lower Back", "xPercent": 50.0, "yPercent": 55.0,
                    "intensity": 4}}]}}"#
        );
        SubmissionRecord::from_snapshot(&Snapshot::from_json(&raw).unwrap()).unwrap()
    }

    #[test]
    fn insert_and_get_round_trip() {
        let conn = open_memory_database().unwrap();
        let rec = record("jane");
        insert_submission(&conn, &rec).unwrap();

        let loaded = get_submission(&conn, &rec.id).unwrap().unwrap();
        assert_eq!(loaded.full_name.as_deref(), Some("jane"));
        assert_eq!(loaded.pain_intensity, Some(4));
        assert_eq!(loaded.goals, vec!["Reduce pain intensity"]);
        assert!(loaded.consent);
        assert_eq!(loaded.pain_points[0]["region"], "Lower Back");
        assert_eq!(loaded.raw_form_data["painDuration"], "Less than 2 weeks");
    }

    #[test]
    fn unknown_id_is_none() {
        let conn = open_memory_database().unwrap();
        assert!(get_submission(&conn, &Uuid::new_v4()).unwrap().is_none());
    }

    #[test]
    fn list_and_count() {
        let conn = open_memory_database().unwrap();
        for name in ["a", "b", "c"] {
            insert_submission(&conn, &record(name)).unwrap();
        }
        assert_eq!(count_submissions(&conn).unwrap(), 3);
        let recent = list_recent_submissions(&conn, 2).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].full_name.as_deref(), Some("c"));
    }
}
