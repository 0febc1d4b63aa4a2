//! Built-in exercise catalog and the 4-week periodization tables.

/// Name of the program produced by the default generator.
pub const DEFAULT_PROGRAM_NAME: &str = "4-Week Strength Program";

/// Category tag carried by accessory exercises.
pub const ACCESSORY_CATEGORY: &str = "accessory";

/// The four competition-style lifts each day is built around.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MainLift {
    Squat,
    Bench,
    Deadlift,
    Press,
}

impl MainLift {
    pub const ALL: [MainLift; 4] = [
        MainLift::Squat,
        MainLift::Bench,
        MainLift::Deadlift,
        MainLift::Press,
    ];

    /// Category tag stored on the exercise.
    pub fn category(&self) -> &'static str {
        match self {
            MainLift::Squat => "squat",
            MainLift::Bench => "bench",
            MainLift::Deadlift => "deadlift",
            MainLift::Press => "press",
        }
    }

    /// Catalog exercise performed for this lift.
    pub fn exercise_name(&self) -> &'static str {
        match self {
            MainLift::Squat => "Back Squat",
            MainLift::Bench => "Bench Press",
            MainLift::Deadlift => "Deadlift",
            MainLift::Press => "Strict Press",
        }
    }
}

/// An exercise seeded on first use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DefaultExercise {
    pub name: &'static str,
    pub category: &'static str,
}

const fn exercise(name: &'static str, category: &'static str) -> DefaultExercise {
    DefaultExercise { name, category }
}

pub const DEFAULT_EXERCISES: [DefaultExercise; 16] = [
    // Main lifts
    exercise("Back Squat", "squat"),
    exercise("Bench Press", "bench"),
    exercise("Deadlift", "deadlift"),
    exercise("Strict Press", "press"),
    // Squat day
    exercise("Leg Press", ACCESSORY_CATEGORY),
    exercise("Walking Lunges", ACCESSORY_CATEGORY),
    exercise("Leg Curl", ACCESSORY_CATEGORY),
    // Bench day
    exercise("Incline Dumbbell Press", ACCESSORY_CATEGORY),
    exercise("Cable Fly", ACCESSORY_CATEGORY),
    exercise("Tricep Pushdown", ACCESSORY_CATEGORY),
    // Deadlift day
    exercise("Barbell Row", ACCESSORY_CATEGORY),
    exercise("Pull-Up", ACCESSORY_CATEGORY),
    exercise("Face Pull", ACCESSORY_CATEGORY),
    // Press day
    exercise("Lateral Raise", ACCESSORY_CATEGORY),
    exercise("Dumbbell Curl", ACCESSORY_CATEGORY),
    exercise("Rear Delt Fly", ACCESSORY_CATEGORY),
];

/// `sets × reps`, optionally at a fraction of the one-rep max.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SetScheme {
    pub sets: u32,
    pub reps: u32,
    pub percentage: Option<f64>,
}

/// Main-lift prescription per week of the cycle.
pub const WEEKLY_MAIN_LIFT_SCHEME: [SetScheme; 4] = [
    // Volume
    SetScheme { sets: 4, reps: 8, percentage: Some(0.70) },
    // Moderate
    SetScheme { sets: 4, reps: 6, percentage: Some(0.75) },
    // Strength
    SetScheme { sets: 5, reps: 4, percentage: Some(0.825) },
    // Peak
    SetScheme { sets: 3, reps: 2, percentage: Some(0.90) },
];

/// Accessory prescription, the same every week.
pub const ACCESSORY_SCHEME: SetScheme = SetScheme {
    sets: 3,
    reps: 10,
    percentage: None,
};

/// One training day of the default layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayLayout {
    pub name: &'static str,
    pub main_lift: MainLift,
    pub accessories: [&'static str; 3],
}

pub const DAY_LAYOUTS: [DayLayout; 4] = [
    DayLayout {
        name: "Squat Day",
        main_lift: MainLift::Squat,
        accessories: ["Leg Press", "Walking Lunges", "Leg Curl"],
    },
    DayLayout {
        name: "Bench Day",
        main_lift: MainLift::Bench,
        accessories: ["Incline Dumbbell Press", "Cable Fly", "Tricep Pushdown"],
    },
    DayLayout {
        name: "Deadlift Day",
        main_lift: MainLift::Deadlift,
        accessories: ["Barbell Row", "Pull-Up", "Face Pull"],
    },
    DayLayout {
        name: "Press Day",
        main_lift: MainLift::Press,
        accessories: ["Lateral Raise", "Dumbbell Curl", "Rear Delt Fly"],
    },
];

/// Sets generated for one day in week `week_index` (0-based).
pub fn sets_per_day(week_index: usize) -> u32 {
    let main = WEEKLY_MAIN_LIFT_SCHEME
        .get(week_index)
        .map(|s| s.sets)
        .unwrap_or(0);
    main + ACCESSORY_SCHEME.sets * 3
}
