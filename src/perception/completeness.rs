//! Completeness score: how much of a crop the primary person occupies.
//!
//! The single metric used to rank duplicate candidates — a larger
//! person-to-frame ratio counts as "more complete" regardless of absolute
//! resolution.

use crate::geometry::Rect;

/// `area(primary_person) / area(photo)`, clamped to [0,1]. Returns 0.0 when
/// there is no detected person or the photo has zero area.
pub fn completeness_score(photo_bbox: &Rect, primary_person: Option<&Rect>) -> f32 {
    let Some(person) = primary_person else {
        return 0.0;
    };
    let photo_area = photo_bbox.area();
    if photo_area <= 0.0 {
        return 0.0;
    }
    (person.area() / photo_area).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fraction_of_frame() {
        let photo = Rect::new(0.0, 0.0, 100.0, 100.0);
        let person = Rect::new(10.0, 10.0, 50.0, 80.0);
        assert!((completeness_score(&photo, Some(&person)) - 0.4).abs() < 1e-6);
    }

    #[test]
    fn clamped_to_one() {
        let photo = Rect::new(0.0, 0.0, 10.0, 10.0);
        let person = Rect::new(0.0, 0.0, 20.0, 20.0);
        assert_eq!(completeness_score(&photo, Some(&person)), 1.0);
    }

    #[test]
    fn no_person_is_zero() {
        let photo = Rect::new(0.0, 0.0, 100.0, 100.0);
        assert_eq!(completeness_score(&photo, None), 0.0);
    }

    #[test]
    fn zero_area_photo_is_zero() {
        let photo = Rect::new(0.0, 0.0, 0.0, 100.0);
        let person = Rect::new(0.0, 0.0, 10.0, 10.0);
        assert_eq!(completeness_score(&photo, Some(&person)), 0.0);
    }
}
