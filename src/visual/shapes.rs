//! UI-region detection from edges and contours, plus template matching.

use std::collections::HashMap;

use image::GrayImage;
use imageproc::contours::{find_contours, BorderType};
use imageproc::edges::canny;
use imageproc::geometry::{approximate_polygon_dp, arc_length, convex_hull};
use imageproc::point::Point;
use imageproc::template_matching::{match_template, MatchTemplateMethod};
use serde::{Deserialize, Serialize};

use crate::config::VisualConfig;
use crate::geometry::Rect;

/// A detected on-screen interface region.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiElement {
    /// Shape class: square, rectangle, triangle, circular, irregular, or the
    /// name of a matched template
    pub element_type: String,
    /// Bounding box in frame coordinates
    pub bounds: Rect,
    /// Detection confidence in [0, 1]
    pub confidence: f32,
    /// Width / height of the bounding box
    pub aspect_ratio: f32,
    /// Contour area in pixels
    pub area: u64,
}

/// Detects rectangular/polygonal UI regions via edge and contour analysis.
///
/// Edges come from Canny; outer contours are filtered by area, simplified
/// with Douglas-Peucker at 2% of the perimeter, and classified by vertex
/// count. Confidence is the contour's solidity (area / convex hull area).
pub fn detect_ui_elements(gray: &GrayImage, config: &VisualConfig) -> Vec<UiElement> {
    let edges = canny(gray, config.canny_low, config.canny_high);
    let contours = find_contours::<i32>(&edges);

    let mut elements = Vec::new();
    for contour in &contours {
        if contour.border_type != BorderType::Outer || contour.points.len() < 3 {
            continue;
        }

        let area = polygon_area(&contour.points);
        if area < config.min_ui_area as f64 || area > config.max_ui_area as f64 {
            continue;
        }

        let hull = convex_hull(contour.points.clone());
        let hull_area = polygon_area(&hull);
        if hull_area <= 0.0 {
            continue;
        }
        let confidence = (area / hull_area).min(1.0) as f32;
        if confidence < config.min_shape_confidence {
            continue;
        }

        let perimeter = arc_length(&contour.points, true);
        let approx = approximate_polygon_dp(&contour.points, perimeter * 0.02, true);
        let bounds = bounding_rect(&contour.points);

        elements.push(UiElement {
            element_type: classify_shape(approx.len(), bounds.aspect_ratio()).to_string(),
            aspect_ratio: bounds.aspect_ratio(),
            area: area as u64,
            bounds,
            confidence,
        });
    }

    elements
}

/// Matches a template library against the frame with normalized
/// cross-correlation. Every location at or above the threshold becomes a
/// distinct element, even when matches overlap; dedup belongs to consumers.
pub fn match_templates(
    gray: &GrayImage,
    templates: &HashMap<String, GrayImage>,
    threshold: f32,
) -> Vec<UiElement> {
    let mut elements = Vec::new();

    for (name, template) in templates {
        let (tw, th) = template.dimensions();
        if tw == 0 || th == 0 || tw > gray.width() || th > gray.height() {
            log::warn!("Template '{}' does not fit the frame, skipping", name);
            continue;
        }

        let scores = match_template(gray, template, MatchTemplateMethod::CrossCorrelationNormalized);
        for (x, y, score) in scores.enumerate_pixels() {
            if score[0] >= threshold {
                let bounds = Rect::new(x as i32, y as i32, tw, th);
                elements.push(UiElement {
                    element_type: name.clone(),
                    aspect_ratio: bounds.aspect_ratio(),
                    area: bounds.area(),
                    bounds,
                    confidence: score[0].min(1.0),
                });
            }
        }
    }

    elements
}

/// Shape class from the simplified polygon's vertex count.
fn classify_shape(vertices: usize, aspect_ratio: f32) -> &'static str {
    match vertices {
        0..=2 => "irregular",
        3 => "triangle",
        4 => {
            if (0.9..=1.1).contains(&aspect_ratio) {
                "square"
            } else {
                "rectangle"
            }
        }
        _ => "circular",
    }
}

/// Shoelace area of a closed polygon.
fn polygon_area(points: &[Point<i32>]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let mut sum = 0i64;
    for i in 0..points.len() {
        let a = points[i];
        let b = points[(i + 1) % points.len()];
        sum += a.x as i64 * b.y as i64 - b.x as i64 * a.y as i64;
    }
    (sum.abs() as f64) / 2.0
}

fn bounding_rect(points: &[Point<i32>]) -> Rect {
    let min_x = points.iter().map(|p| p.x).min().unwrap_or(0);
    let min_y = points.iter().map(|p| p.y).min().unwrap_or(0);
    let max_x = points.iter().map(|p| p.x).max().unwrap_or(0);
    let max_y = points.iter().map(|p| p.y).max().unwrap_or(0);
    Rect::new(min_x, min_y, (max_x - min_x) as u32, (max_y - min_y) as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;
    use imageproc::drawing::draw_filled_rect_mut;

    fn frame_with_rect(x: i32, y: i32, w: u32, h: u32) -> GrayImage {
        let mut img = GrayImage::from_pixel(400, 300, Luma([0]));
        draw_filled_rect_mut(
            &mut img,
            imageproc::rect::Rect::at(x, y).of_size(w, h),
            Luma([255]),
        );
        img
    }

    #[test]
    fn test_detects_rectangle() {
        let img = frame_with_rect(50, 50, 120, 40);
        let elements = detect_ui_elements(&img, &VisualConfig::default());
        assert!(!elements.is_empty());
        let best = elements
            .iter()
            .max_by_key(|e| e.area)
            .unwrap();
        assert_eq!(best.element_type, "rectangle");
        assert!((best.bounds.x - 50).abs() <= 3);
        assert!((best.bounds.y - 50).abs() <= 3);
    }

    #[test]
    fn test_detects_low_contrast_rectangle() {
        // A subdued HUD bar: ~18 luma above the background, the kind of
        // step a red health bar leaves on a mid-gray scene. Must still be
        // found with the default thresholds.
        let mut img = GrayImage::from_pixel(400, 300, Luma([60]));
        draw_filled_rect_mut(
            &mut img,
            imageproc::rect::Rect::at(20, 20).of_size(200, 30),
            Luma([78]),
        );
        let elements = detect_ui_elements(&img, &VisualConfig::default());
        let bar = elements
            .iter()
            .find(|e| e.element_type == "rectangle")
            .expect("low-contrast bar not detected");
        assert!((bar.bounds.x - 20).abs() <= 3);
        assert!((bar.bounds.y - 20).abs() <= 3);
        assert!(bar.aspect_ratio > 2.0);
    }

    #[test]
    fn test_detects_square() {
        let img = frame_with_rect(100, 100, 80, 80);
        let elements = detect_ui_elements(&img, &VisualConfig::default());
        assert!(elements.iter().any(|e| e.element_type == "square"));
    }

    #[test]
    fn test_blank_frame_yields_no_elements() {
        let img = GrayImage::from_pixel(200, 200, Luma([0]));
        let elements = detect_ui_elements(&img, &VisualConfig::default());
        assert!(elements.is_empty());
    }

    #[test]
    fn test_area_filter() {
        // Tiny 4x4 rect falls below min_ui_area
        let img = frame_with_rect(10, 10, 4, 4);
        let elements = detect_ui_elements(&img, &VisualConfig::default());
        assert!(elements.is_empty());
    }

    #[test]
    fn test_template_match_finds_embedded_template() {
        let img = frame_with_rect(60, 40, 30, 30);
        let template = image::imageops::crop_imm(&img, 60, 40, 30, 30).to_image();
        let mut templates = HashMap::new();
        templates.insert("icon".to_string(), template);

        let matches = match_templates(&img, &templates, 0.95);
        assert!(matches.iter().any(|m| {
            m.element_type == "icon" && (m.bounds.x - 60).abs() <= 1 && (m.bounds.y - 40).abs() <= 1
        }));
    }

    #[test]
    fn test_oversized_template_skipped() {
        let img = GrayImage::from_pixel(50, 50, Luma([0]));
        let mut templates = HashMap::new();
        templates.insert("big".to_string(), GrayImage::from_pixel(100, 100, Luma([0])));
        assert!(match_templates(&img, &templates, 0.8).is_empty());
    }

    #[test]
    fn test_polygon_area_unit_square() {
        let points = vec![
            Point::new(0, 0),
            Point::new(10, 0),
            Point::new(10, 10),
            Point::new(0, 10),
        ];
        assert!((polygon_area(&points) - 100.0).abs() < 0.001);
    }
}
