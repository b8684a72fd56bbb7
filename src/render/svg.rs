//! SVG chart recovery.
//!
//! Chart-like `<svg>` elements are found by class/id/parent-class markers and
//! their drawing primitives copied out. Path data is decoded into points for
//! move/line commands only.

use dom_query::Selection;

use crate::dom::{attr_or_empty, clean_text, select_each};
use crate::patterns::PATH_TOKEN;
use crate::result::{PathPoint, SvgChart, SvgCircle, SvgElements, SvgPath, SvgRect, SvgText};

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token {
    Command(char),
    Number(f64),
}

fn tokenize(d: &str) -> Vec<Token> {
    PATH_TOKEN
        .find_iter(d)
        .filter_map(|m| {
            let s = m.as_str();
            let mut chars = s.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) if c.is_ascii_alphabetic() => Some(Token::Command(c)),
                _ => s.parse::<f64>().ok().map(Token::Number),
            }
        })
        .collect()
}

/// Number of arguments one application of `command` consumes.
fn arity(command: char) -> usize {
    match command.to_ascii_uppercase() {
        'M' | 'L' | 'T' => 2,
        'H' | 'V' => 1,
        'S' | 'Q' => 4,
        'C' => 6,
        'A' => 7,
        _ => 0,
    }
}

/// Decode path data into points.
///
/// `M`/`L`/`H`/`V` (absolute and relative) emit one point per application,
/// including implicit repeats; extra pairs after a move are treated as line
/// segments. Curve and arc commands advance the pen to their end point but
/// emit nothing. `Z` returns the pen to the subpath start.
///
/// # Example
///
/// ```rust
/// use signal_scraper::render::decode_path;
///
/// let points = decode_path("M 10 20 L 30 40 L 50 60");
/// assert_eq!(points.len(), 3);
/// assert_eq!((points[2].x, points[2].y), (50.0, 60.0));
/// ```
#[must_use]
pub fn decode_path(d: &str) -> Vec<PathPoint> {
    let tokens = tokenize(d);
    let mut points = Vec::new();
    let (mut x, mut y) = (0.0_f64, 0.0_f64);
    let (mut start_x, mut start_y) = (0.0_f64, 0.0_f64);
    let mut current: Option<char> = None;
    let mut i = 0;

    while i < tokens.len() {
        let command = match tokens[i] {
            Token::Command(c) => {
                i += 1;
                if c.eq_ignore_ascii_case(&'z') {
                    x = start_x;
                    y = start_y;
                    current = None;
                    continue;
                }
                current = Some(c);
                c
            }
            Token::Number(_) => match current {
                Some(c) => c,
                None => {
                    // Stray number with no command in effect.
                    i += 1;
                    continue;
                }
            },
        };

        let needed = arity(command);
        if needed == 0 {
            current = None;
            continue;
        }
        let args: Vec<f64> = tokens[i..]
            .iter()
            .take(needed)
            .map_while(|t| match t {
                Token::Number(n) => Some(*n),
                Token::Command(_) => None,
            })
            .collect();
        i += args.len();
        if args.len() < needed {
            // Truncated segment; drop it and resync on the next command.
            current = None;
            continue;
        }

        let relative = command.is_ascii_lowercase();
        let (dx, dy) = if relative { (x, y) } else { (0.0, 0.0) };

        match command.to_ascii_uppercase() {
            'M' => {
                x = args[0] + dx;
                y = args[1] + dy;
                start_x = x;
                start_y = y;
                points.push(PathPoint { command, x, y });
                // Further pairs are implicit line-tos.
                current = Some(if relative { 'l' } else { 'L' });
            }
            'L' => {
                x = args[0] + dx;
                y = args[1] + dy;
                points.push(PathPoint { command, x, y });
            }
            'H' => {
                x = args[0] + dx;
                points.push(PathPoint { command, x, y });
            }
            'V' => {
                y = args[0] + dy;
                points.push(PathPoint { command, x, y });
            }
            'C' => {
                x = args[4] + dx;
                y = args[5] + dy;
            }
            'S' | 'Q' => {
                x = args[2] + dx;
                y = args[3] + dy;
            }
            'T' => {
                x = args[0] + dx;
                y = args[1] + dy;
            }
            'A' => {
                x = args[5] + dx;
                y = args[6] + dy;
            }
            _ => {}
        }
    }
    points
}

fn is_chart_like(svg: &Selection, markers: &[String]) -> bool {
    let parent_class = svg
        .parent()
        .attr("class")
        .map(|c| c.to_string())
        .unwrap_or_default();
    let haystacks = [
        attr_or_empty(svg, "class").to_ascii_lowercase(),
        attr_or_empty(svg, "id").to_ascii_lowercase(),
        parent_class.to_ascii_lowercase(),
    ];
    markers.iter().any(|marker| {
        let marker = marker.to_ascii_lowercase();
        haystacks.iter().any(|h| h.contains(&marker))
    })
}

fn svg_elements(svg: &Selection) -> SvgElements {
    SvgElements {
        paths: select_each(svg, "path")
            .iter()
            .map(|p| {
                let d = attr_or_empty(p, "d");
                SvgPath {
                    points: decode_path(&d),
                    d,
                    stroke: attr_or_empty(p, "stroke"),
                    fill: attr_or_empty(p, "fill"),
                    stroke_width: attr_or_empty(p, "stroke-width"),
                    class: attr_or_empty(p, "class"),
                }
            })
            .collect(),
        circles: select_each(svg, "circle")
            .iter()
            .map(|c| SvgCircle {
                cx: attr_or_empty(c, "cx"),
                cy: attr_or_empty(c, "cy"),
                r: attr_or_empty(c, "r"),
                fill: attr_or_empty(c, "fill"),
                class: attr_or_empty(c, "class"),
            })
            .collect(),
        rects: select_each(svg, "rect")
            .iter()
            .map(|r| SvgRect {
                x: attr_or_empty(r, "x"),
                y: attr_or_empty(r, "y"),
                width: attr_or_empty(r, "width"),
                height: attr_or_empty(r, "height"),
                fill: attr_or_empty(r, "fill"),
                class: attr_or_empty(r, "class"),
            })
            .collect(),
        texts: select_each(svg, "text")
            .iter()
            .map(|t| SvgText {
                x: attr_or_empty(t, "x"),
                y: attr_or_empty(t, "y"),
                content: clean_text(t),
                class: attr_or_empty(t, "class"),
            })
            .collect(),
    }
}

/// Every chart-like `<svg>` under `root`. `index` counts all `<svg>` elements.
#[must_use]
pub fn extract_svg_charts(root: &Selection, markers: &[String]) -> Vec<SvgChart> {
    select_each(root, "svg")
        .iter()
        .enumerate()
        .filter(|(_, svg)| is_chart_like(svg, markers))
        .map(|(index, svg)| SvgChart {
            index,
            id: attr_or_empty(svg, "id"),
            class: attr_or_empty(svg, "class"),
            view_box: svg
                .attr("viewBox")
                .or_else(|| svg.attr("viewbox"))
                .map(|v| v.to_string())
                .unwrap_or_default(),
            width: attr_or_empty(svg, "width"),
            height: attr_or_empty(svg, "height"),
            elements: svg_elements(svg),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{parse, root};

    fn xy(points: &[PathPoint]) -> Vec<(char, f64, f64)> {
        points.iter().map(|p| (p.command, p.x, p.y)).collect()
    }

    #[test]
    fn move_and_line_points() {
        assert_eq!(
            xy(&decode_path("M 10 20 L 30 40 L 50 60")),
            vec![('M', 10.0, 20.0), ('L', 30.0, 40.0), ('L', 50.0, 60.0)]
        );
    }

    #[test]
    fn curve_only_path_has_no_points() {
        assert!(decode_path("C 10 10 20 20 30 30").is_empty());
        assert!(decode_path("Q 1 2 3 4 T 5 6").is_empty());
    }

    #[test]
    fn curves_advance_the_pen() {
        assert_eq!(
            xy(&decode_path("M0,0 c10,10 20,20 30,30 l5,5")),
            vec![('M', 0.0, 0.0), ('l', 35.0, 35.0)]
        );
        assert_eq!(
            xy(&decode_path("M0 0 A5 5 0 0 1 10 0 L 20 0")),
            vec![('M', 0.0, 0.0), ('L', 20.0, 0.0)]
        );
    }

    #[test]
    fn relative_and_implicit_repeats() {
        assert_eq!(
            xy(&decode_path("m10 10 5 0 0 5 h-5 v-5")),
            vec![
                ('m', 10.0, 10.0),
                ('l', 15.0, 10.0),
                ('l', 15.0, 15.0),
                ('h', 10.0, 15.0),
                ('v', 10.0, 10.0)
            ]
        );
        assert_eq!(
            xy(&decode_path("M0 0 L1 1 2 2 3 3")),
            vec![('M', 0.0, 0.0), ('L', 1.0, 1.0), ('L', 2.0, 2.0), ('L', 3.0, 3.0)]
        );
    }

    #[test]
    fn close_path_returns_to_subpath_start() {
        assert_eq!(
            xy(&decode_path("M10 10 L20 10 Z l5 5")),
            vec![('M', 10.0, 10.0), ('L', 20.0, 10.0), ('l', 15.0, 15.0)]
        );
    }

    #[test]
    fn packed_numbers_and_truncated_segments() {
        assert_eq!(
            xy(&decode_path("M10-5L.5.5")),
            vec![('M', 10.0, -5.0), ('L', 0.5, 0.5)]
        );
        assert_eq!(xy(&decode_path("M1 2 L3")), vec![('M', 1.0, 2.0)]);
        assert!(decode_path("").is_empty());
    }

    #[test]
    fn curve_only_path_is_kept_without_points() {
        let doc = parse(
            r#"<div class="chart"><svg><path d="C 10 10 20 20 30 30" stroke="red"/></svg></div>"#,
        );
        let charts = extract_svg_charts(&root(&doc), &["chart".to_string()]);

        assert_eq!(charts.len(), 1);
        let paths = &charts[0].elements.paths;
        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].d, "C 10 10 20 20 30 30");
        assert_eq!(paths[0].stroke, "red");
        assert!(paths[0].points.is_empty());
    }

    #[test]
    fn only_chart_like_svgs_are_collected() {
        let doc = parse(
            r##"<body>
                <svg class="icon"><path d="M0 0 L1 1"/></svg>
                <div class="signal-chart">
                    <svg width="600" height="300" viewBox="0 0 600 300">
                        <path d="M0 100 L10 90" stroke="#3e8ef7" stroke-width="2"/>
                        <circle cx="10" cy="90" r="3"/>
                        <rect x="0" y="0" width="600" height="300" class="highcharts-background"/>
                        <text x="5" y="15">Growth</text>
                    </svg>
                </div>
                <svg id="equity-graph"></svg>
            </body>"##,
        );
        let markers = vec!["chart".to_string(), "graph".to_string()];
        let charts = extract_svg_charts(&root(&doc), &markers);

        assert_eq!(charts.len(), 2);
        let first = &charts[0];
        assert_eq!(first.index, 1);
        assert_eq!(first.view_box, "0 0 600 300");
        assert_eq!(first.elements.paths[0].stroke_width, "2");
        assert_eq!(first.elements.paths[0].points.len(), 2);
        assert_eq!(first.elements.circles[0].r, "3");
        assert_eq!(first.elements.rects.len(), 1);
        assert_eq!(first.elements.texts[0].content, "Growth");
        assert_eq!(charts[1].index, 2);
        assert_eq!(charts[1].id, "equity-graph");
    }
}
