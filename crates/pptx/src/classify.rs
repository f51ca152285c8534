//! Placeholder classification for layout shapes.
//!
//! Two tiers, both expressed as rule tables:
//!
//! 1. Placeholder metadata. Shapes that carry a `<p:ph>` element are mapped
//!    by its `type` attribute.
//! 2. Heuristics, for the shapes without `<p:ph>` (plain text boxes and
//!    pictures). They only fill roles the metadata left open. Rules run in
//!    priority order and each claims the first matching shape, top to
//!    bottom.
//!
//! The first shape per role wins in both tiers.

use crate::template::{RawShape, ShapeKind};
use carousel_core::PlaceholderRole;
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;

/// How a shape was assigned its role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// From the `<p:ph type>` attribute.
    Metadata,
    /// From the named heuristic rule.
    Heuristic(&'static str),
}

/// `<p:ph type>` values per role. A placeholder without a type is a body
/// ("obj") placeholder.
const METADATA_RULES: [(&[&str], PlaceholderRole); 4] = [
    (&["title", "ctrTitle"], PlaceholderRole::Title),
    (&["body", "subTitle", "obj"], PlaceholderRole::Body),
    (
        &["pic", "clipArt", "media", "chart", "tbl", "dgm"],
        PlaceholderRole::Image,
    ),
    (&["ftr", "dt", "sldNum"], PlaceholderRole::Footer),
];

/// Role for a placeholder type, if it maps to one.
pub fn metadata_role(ph_type: Option<&str>) -> Option<PlaceholderRole> {
    let ph_type = ph_type.unwrap_or("obj");
    METADATA_RULES
        .iter()
        .find(|(types, _)| types.contains(&ph_type))
        .map(|(_, role)| *role)
}

static TITLE_NAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(title|heading|headline|t[ií]tulo)\b").unwrap());

static TITLE_TOKEN_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\{\{\s*title\d*\s*\}\}").unwrap());

static FOOTER_NAME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(footer|\bdate\b|slide\s*number|page\s*number|pie de p[aá]gina|fecha)").unwrap()
});

static IMAGE_NAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(picture|image|photo|logo|imagen|foto)").unwrap());

/// Whole words only: PowerPoint's default "TextBox 3" is not a body name.
static BODY_NAME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(body|content|text|subtitle|contenido|texto|cuerpo)\b").unwrap()
});

static BODY_TOKEN_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\{\{\s*body\d*\s*\}\}").unwrap());

/// Shapes still in play while heuristic rules run.
struct Candidates<'a> {
    shapes: &'a [RawShape],
    /// Shape indices sorted top to bottom, then left to right.
    order: &'a [usize],
    taken: &'a [bool],
    slide_width: i64,
}

impl Candidates<'_> {
    fn untaken_text(&self) -> impl Iterator<Item = usize> + '_ {
        self.order
            .iter()
            .copied()
            .filter(|&i| !self.taken[i] && self.shapes[i].kind == ShapeKind::Text)
    }
}

fn is_body_named(shape: &RawShape) -> bool {
    BODY_NAME_REGEX.is_match(&shape.name) || BODY_TOKEN_REGEX.is_match(&shape.text)
}

struct HeuristicRule {
    name: &'static str,
    role: PlaceholderRole,
    matches: fn(usize, &Candidates<'_>) -> bool,
}

static HEURISTIC_RULES: [HeuristicRule; 6] = [
    HeuristicRule {
        name: "title-name",
        role: PlaceholderRole::Title,
        matches: |i, c| {
            let s = &c.shapes[i];
            s.kind == ShapeKind::Text
                && (TITLE_NAME_REGEX.is_match(&s.name) || TITLE_TOKEN_REGEX.is_match(&s.text))
        },
    },
    HeuristicRule {
        name: "footer-name",
        role: PlaceholderRole::Footer,
        matches: |i, c| {
            let s = &c.shapes[i];
            s.kind == ShapeKind::Text && FOOTER_NAME_REGEX.is_match(&s.name)
        },
    },
    HeuristicRule {
        name: "picture",
        role: PlaceholderRole::Image,
        matches: |i, c| {
            let s = &c.shapes[i];
            s.kind == ShapeKind::Picture || IMAGE_NAME_REGEX.is_match(&s.name)
        },
    },
    HeuristicRule {
        name: "topmost-wide-text",
        role: PlaceholderRole::Title,
        matches: |i, c| {
            let is_topmost = c
                .untaken_text()
                .find(|&j| !is_body_named(&c.shapes[j]))
                == Some(i);
            let several = c.untaken_text().nth(1).is_some();
            let wide = c.shapes[i]
                .frame
                .is_some_and(|f| f.cx * 2 >= c.slide_width);
            is_topmost && several && wide
        },
    },
    HeuristicRule {
        name: "body-name",
        role: PlaceholderRole::Body,
        matches: |i, c| c.shapes[i].kind == ShapeKind::Text && is_body_named(&c.shapes[i]),
    },
    HeuristicRule {
        name: "text-default",
        role: PlaceholderRole::Body,
        matches: |i, c| c.shapes[i].kind == ShapeKind::Text,
    },
];

/// Assign roles to the shapes of one layout. Returns, per role, the index
/// of the claiming shape and how it was classified.
pub fn classify_shapes(
    shapes: &[RawShape],
    slide_width: i64,
) -> BTreeMap<PlaceholderRole, (usize, Classification)> {
    let mut claimed = BTreeMap::new();
    let mut taken = vec![false; shapes.len()];

    for (i, shape) in shapes.iter().enumerate() {
        let Some(ph) = &shape.placeholder else {
            continue;
        };
        // Placeholders are never handed to the heuristics.
        taken[i] = true;
        match metadata_role(ph.ph_type.as_deref()) {
            Some(role) => {
                claimed.entry(role).or_insert((i, Classification::Metadata));
            }
            None => log::debug!(
                "Ignoring placeholder '{}' of type {:?}",
                shape.name,
                ph.ph_type
            ),
        }
    }

    let mut order: Vec<usize> = (0..shapes.len()).filter(|&i| !taken[i]).collect();
    order.sort_by_key(|&i| {
        shapes[i]
            .frame
            .map(|f| (f.y, f.x))
            .unwrap_or((i64::MAX, i64::MAX))
    });

    for rule in &HEURISTIC_RULES {
        if claimed.contains_key(&rule.role) {
            continue;
        }
        let found = {
            let candidates = Candidates {
                shapes,
                order: &order,
                taken: &taken,
                slide_width,
            };
            order
                .iter()
                .copied()
                .find(|&i| !taken[i] && (rule.matches)(i, &candidates))
        };
        if let Some(i) = found {
            taken[i] = true;
            claimed.insert(rule.role, (i, Classification::Heuristic(rule.name)));
        }
    }

    claimed
}
