//! Program, week and day views.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::model::{Exercise, MaxLift, Program, ProgramWeek, WorkoutDay, WorkoutSet};
use crate::store::Collections;

/// Name shown for a set whose exercise is missing or deleted.
pub const UNKNOWN_EXERCISE: &str = "Unknown";

/// A prescribed set with its exercise name resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkoutSetView {
    pub set: WorkoutSet,
    pub exercise_name: String,
}

/// Sets of one exercise, in set order.
#[derive(Debug, Clone, PartialEq)]
pub struct ExerciseGroup {
    pub exercise_id: Uuid,
    pub exercise_name: String,
    pub sets: Vec<WorkoutSet>,
}

/// Completion of the days in one program week.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WeekCompletion {
    pub completed_day_ids: BTreeSet<Uuid>,
    pub total_days: usize,
    pub all_complete: bool,
}

/// A day of a program's current week.
#[derive(Debug, Clone, PartialEq)]
pub struct CurrentWorkoutDay {
    pub day: WorkoutDay,
    pub program_id: Uuid,
    pub program_name: String,
    pub week_number: u32,
}

fn exercise_name(c: &Collections, id: &Uuid) -> String {
    c.exercises
        .get_live(id)
        .map(|e| e.name.clone())
        .unwrap_or_else(|| UNKNOWN_EXERCISE.to_string())
}

fn start_key(p: &Program) -> DateTime<Utc> {
    p.start_date.unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

/// Live exercises by name.
pub fn exercises(c: &Collections) -> Vec<Exercise> {
    let mut list: Vec<Exercise> = c.exercises.live().cloned().collect();
    list.sort_by(|a, b| a.name.cmp(&b.name));
    list
}

/// Latest recorded max per exercise. Lifts without a date are ignored.
pub fn current_max_lifts(c: &Collections) -> BTreeMap<Uuid, f64> {
    let mut latest: HashMap<Uuid, &MaxLift> = HashMap::new();

    for lift in c.max_lifts.live() {
        let Some(date) = lift.date_recorded else {
            continue;
        };
        let newer = latest
            .get(&lift.exercise_id)
            .map_or(true, |existing| existing.date_recorded.map_or(true, |d| date > d));
        if newer {
            latest.insert(lift.exercise_id, lift);
        }
    }

    latest
        .into_iter()
        .map(|(id, lift)| (id, lift.weight_kg))
        .collect()
}

/// Live programs, most recently started first.
pub fn all_programs(c: &Collections) -> Vec<Program> {
    let mut list: Vec<Program> = c.programs.live().cloned().collect();
    list.sort_by(|a, b| start_key(b).cmp(&start_key(a)));
    list
}

/// The most recently started live program.
pub fn active_program(c: &Collections) -> Option<Program> {
    all_programs(c).into_iter().next()
}

fn find_week<'a>(c: &'a Collections, program_id: &Uuid, week_number: u32) -> Option<&'a ProgramWeek> {
    c.program_weeks
        .live()
        .find(|w| w.program_id == *program_id && w.week_number == week_number)
}

fn days_of_week<'a>(c: &'a Collections, week_id: Uuid) -> impl Iterator<Item = &'a WorkoutDay> + 'a {
    c.workout_days
        .live()
        .filter(move |d| d.program_week_id == week_id)
}

/// Days of one program week, by day number.
pub fn week_workouts(c: &Collections, program_id: &Uuid, week_number: u32) -> Vec<WorkoutDay> {
    let Some(week) = find_week(c, program_id, week_number) else {
        return Vec::new();
    };

    let mut days: Vec<WorkoutDay> = days_of_week(c, week.meta.id).cloned().collect();
    days.sort_by_key(|d| d.day_number);
    days
}

/// Sets of a day by set number, with exercise names.
pub fn workout_day_sets(c: &Collections, workout_day_id: &Uuid) -> Vec<WorkoutSetView> {
    let mut sets: Vec<&WorkoutSet> = c
        .workout_sets
        .live()
        .filter(|s| s.workout_day_id == *workout_day_id)
        .collect();
    sets.sort_by_key(|s| s.set_number);

    sets.into_iter()
        .map(|s| WorkoutSetView {
            exercise_name: exercise_name(c, &s.exercise_id),
            set: s.clone(),
        })
        .collect()
}

fn group_by_exercise<'a>(c: &Collections, sets: impl IntoIterator<Item = &'a WorkoutSet>) -> Vec<ExerciseGroup> {
    let mut groups: Vec<ExerciseGroup> = Vec::new();
    let mut index: HashMap<Uuid, usize> = HashMap::new();

    for set in sets {
        let slot = *index.entry(set.exercise_id).or_insert_with(|| {
            groups.push(ExerciseGroup {
                exercise_id: set.exercise_id,
                exercise_name: exercise_name(c, &set.exercise_id),
                sets: Vec::new(),
            });
            groups.len() - 1
        });
        groups[slot].sets.push(set.clone());
    }

    groups
}

/// Sets of a day grouped by exercise, in order of first appearance.
pub fn workout_day_exercises(c: &Collections, workout_day_id: &Uuid) -> Vec<ExerciseGroup> {
    multi_day_exercises(c, &[*workout_day_id])
}

/// Sets of several days grouped by exercise; an exercise performed on
/// more than one day forms a single group.
pub fn multi_day_exercises(c: &Collections, workout_day_ids: &[Uuid]) -> Vec<ExerciseGroup> {
    if workout_day_ids.is_empty() {
        return Vec::new();
    }

    let position: HashMap<Uuid, usize> = workout_day_ids
        .iter()
        .enumerate()
        .map(|(i, id)| (*id, i))
        .collect();

    let mut sets: Vec<&WorkoutSet> = c
        .workout_sets
        .live()
        .filter(|s| position.contains_key(&s.workout_day_id))
        .collect();
    sets.sort_by_key(|s| (s.set_number, position.get(&s.workout_day_id).copied()));

    group_by_exercise(c, sets)
}

/// Day ids covered by completed, live sessions, directly or through
/// session-day links.
pub fn completed_day_ids(c: &Collections) -> HashSet<Uuid> {
    let completed: HashSet<Uuid> = c
        .workout_sessions
        .live()
        .filter(|s| s.is_completed())
        .map(|s| s.meta.id)
        .collect();

    let direct = c
        .workout_sessions
        .live()
        .filter(|s| s.is_completed())
        .filter_map(|s| s.workout_day_id);

    let linked = c
        .session_workout_days
        .live()
        .filter(|link| completed.contains(&link.session_id))
        .map(|link| link.workout_day_id);

    direct.chain(linked).collect()
}

/// Which days of one program week have a completed session.
pub fn week_completion(c: &Collections, program_id: &Uuid, week_number: u32) -> WeekCompletion {
    let Some(week) = find_week(c, program_id, week_number) else {
        return WeekCompletion::default();
    };

    let done = completed_day_ids(c);
    let day_ids: Vec<Uuid> = days_of_week(c, week.meta.id).map(|d| d.meta.id).collect();
    let completed_day_ids: BTreeSet<Uuid> = day_ids
        .iter()
        .filter(|id| done.contains(id))
        .copied()
        .collect();

    let total_days = day_ids.len();
    WeekCompletion {
        all_complete: total_days > 0 && completed_day_ids.len() == total_days,
        completed_day_ids,
        total_days,
    }
}

/// Week numbers of a program whose every day is complete.
pub fn completed_weeks(c: &Collections, program_id: &Uuid) -> BTreeSet<u32> {
    let done = completed_day_ids(c);

    c.program_weeks
        .live()
        .filter(|w| w.program_id == *program_id)
        .filter(|w| {
            let mut days = days_of_week(c, w.meta.id).peekable();
            days.peek().is_some() && days.all(|d| done.contains(&d.meta.id))
        })
        .map(|w| w.week_number)
        .collect()
}

/// Days of every live program's current week, by program name then day.
pub fn all_current_workout_days(c: &Collections) -> Vec<CurrentWorkoutDay> {
    let mut result = Vec::new();

    for program in c.programs.live() {
        let Some(week) = find_week(c, &program.meta.id, program.current_week.max(1)) else {
            continue;
        };
        result.extend(days_of_week(c, week.meta.id).map(|day| CurrentWorkoutDay {
            day: day.clone(),
            program_id: program.meta.id,
            program_name: program.name.clone(),
            week_number: week.week_number,
        }));
    }

    result.sort_by(|a, b| {
        a.program_name
            .cmp(&b.program_name)
            .then(a.day.day_number.cmp(&b.day.day_number))
    });
    result
}
