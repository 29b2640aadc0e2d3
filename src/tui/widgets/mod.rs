pub mod dashboard;
pub mod session;
pub mod topic_detail;
pub mod topics;
pub mod weekly;

use ratatui::style::Color;

use crate::models::MasteryStatus;

pub fn status_color(status: MasteryStatus) -> Color {
    match status {
        MasteryStatus::Weak => Color::Red,
        MasteryStatus::Average => Color::Yellow,
        MasteryStatus::Strong => Color::Green,
        MasteryStatus::Excellent => Color::Cyan,
    }
}

pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod truncate_tests {
        use super::*;

        #[test]
        fn short_strings_untouched() {
            assert_eq!(truncate("Acids", 10), "Acids");
        }

        #[test]
        fn long_strings_get_ellipsis() {
            assert_eq!(truncate("Photosynthesis", 8), "Photo...");
        }

        #[test]
        fn multibyte_is_safe() {
            assert_eq!(truncate("Ünïcödé tëxt", 6), "Ünï...");
        }
    }
}
