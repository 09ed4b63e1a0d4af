use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lesson {
    pub id: String,
    pub ticks: u32,
    /// Character config id to template id.
    pub assignments: BTreeMap<String, String>,
}

/// Lessons in order, looping forever. The bell rings whenever the current
/// lesson's tick budget runs out.
#[derive(Debug, Clone, Default)]
pub struct Timetable {
    lessons: Vec<Lesson>,
    current: usize,
    remaining: u32,
}

impl Timetable {
    pub fn new(lessons: Vec<Lesson>) -> Self {
        let remaining = lessons.first().map_or(0, |lesson| lesson.ticks.max(1));
        Self {
            lessons,
            current: 0,
            remaining,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.lessons.is_empty()
    }

    pub fn lessons(&self) -> &[Lesson] {
        &self.lessons
    }

    pub fn current(&self) -> Option<&Lesson> {
        self.lessons.get(self.current)
    }

    pub fn remaining_ticks(&self) -> u32 {
        self.remaining
    }

    pub fn template_for(&self, config_id: &str) -> Option<&str> {
        self.current()?
            .assignments
            .get(config_id)
            .map(String::as_str)
    }

    /// Counts down one tick; `true` when the bell rang and the next lesson began.
    pub fn advance(&mut self) -> bool {
        if self.lessons.is_empty() {
            return false;
        }
        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining > 0 {
            return false;
        }
        self.current = (self.current + 1) % self.lessons.len();
        self.remaining = self.lessons[self.current].ticks.max(1);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lesson(id: &str, ticks: u32, assignments: &[(&str, &str)]) -> Lesson {
        Lesson {
            id: id.to_string(),
            ticks,
            assignments: assignments
                .iter()
                .map(|(who, script)| (who.to_string(), script.to_string()))
                .collect(),
        }
    }

    #[test]
    fn bell_rings_when_budget_lapses_and_lessons_loop() {
        let mut timetable = Timetable::new(vec![
            lesson("Assembly", 2, &[("WACKER", "Assembly")]),
            lesson("Playtime", 1, &[]),
        ]);

        assert_eq!(timetable.template_for("WACKER"), Some("Assembly"));
        assert!(!timetable.advance());
        assert!(timetable.advance());
        assert_eq!(timetable.current().map(|lesson| lesson.id.as_str()), Some("Playtime"));
        assert_eq!(timetable.template_for("WACKER"), None);
        assert!(timetable.advance());
        assert_eq!(timetable.current().map(|lesson| lesson.id.as_str()), Some("Assembly"));
    }

    #[test]
    fn empty_timetable_never_rings() {
        let mut timetable = Timetable::default();
        assert!(!timetable.advance());
        assert!(timetable.current().is_none());
    }
}
