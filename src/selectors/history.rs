//! Sessions, logs and templates.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::model::{SessionWorkoutDay, SetLog, TemplateItem, WorkoutSession, WorkoutTemplate};
use crate::store::Collections;

/// Live templates, newest first.
pub fn workout_templates(c: &Collections) -> Vec<WorkoutTemplate> {
    let mut list: Vec<WorkoutTemplate> = c.workout_templates.live().cloned().collect();
    list.sort_by(|a, b| b.meta.created_at.cmp(&a.meta.created_at));
    list
}

/// Items of a template by sort order.
pub fn template_items(c: &Collections, template_id: &Uuid) -> Vec<TemplateItem> {
    let mut items: Vec<TemplateItem> = c
        .template_items
        .live()
        .filter(|i| i.template_id == *template_id)
        .cloned()
        .collect();
    items.sort_by_key(|i| i.sort_order);
    items
}

/// Completed sessions, most recently finished first.
pub fn workout_history(c: &Collections) -> Vec<WorkoutSession> {
    let finished = |s: &WorkoutSession| s.completed_at.unwrap_or(DateTime::<Utc>::UNIX_EPOCH);

    let mut list: Vec<WorkoutSession> = c
        .workout_sessions
        .live()
        .filter(|s| s.is_completed())
        .cloned()
        .collect();
    list.sort_by(|a, b| finished(b).cmp(&finished(a)));
    list
}

/// Set logs of a session in the order they were recorded.
pub fn session_logs(c: &Collections, session_id: &Uuid) -> Vec<SetLog> {
    let mut logs: Vec<SetLog> = c
        .set_logs
        .live()
        .filter(|l| l.workout_session_id == *session_id)
        .cloned()
        .collect();
    logs.sort_by_key(|l| l.meta.created_at);
    logs
}

/// Day links of a multi-day session by sort order.
pub fn session_days(c: &Collections, session_id: &Uuid) -> Vec<SessionWorkoutDay> {
    let mut days: Vec<SessionWorkoutDay> = c
        .session_workout_days
        .live()
        .filter(|d| d.session_id == *session_id)
        .cloned()
        .collect();
    days.sort_by_key(|d| d.sort_order);
    days
}
