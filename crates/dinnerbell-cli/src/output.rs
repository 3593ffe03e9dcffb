use std::io::Write;

use dinnerbell_core::{CUISINES, FilterSet, RestaurantRecord};
use owo_colors::OwoColorize;

/// Whether to use colored output.
#[derive(Debug, Clone, Copy)]
pub struct ColorMode(pub bool);

impl ColorMode {
    pub fn enabled(&self) -> bool {
        self.0
    }
}

pub const NO_MATCH_HINT: &str = "No restaurants match that criteria. Try expanding your search radius or turning off the \"Open Now\" filter!";

/// One line describing what is being searched for.
pub fn print_search_header(
    w: &mut dyn Write,
    filters: &FilterSet,
    color: ColorMode,
) -> std::io::Result<()> {
    let open = if filters.is_open_now { ", open now" } else { "" };
    let line = format!(
        "{} within {} miles of {} (party of {}{})",
        filters.food_type, filters.distance, filters.zip_code, filters.party_size, open
    );
    if color.enabled() {
        writeln!(w, "{}", line.bold())?;
    } else {
        writeln!(w, "{}", line)?;
    }
    Ok(())
}

pub fn print_source_note(w: &mut dyn Write, note: &str, color: ColorMode) -> std::io::Result<()> {
    if color.enabled() {
        writeln!(w, "{}", format!("({})", note).dimmed())?;
    } else {
        writeln!(w, "({})", note)?;
    }
    writeln!(w)?;
    Ok(())
}

/// Print one page of up to three recommendations.
pub fn print_page(
    w: &mut dyn Write,
    page: usize,
    restaurants: &[RestaurantRecord],
    color: ColorMode,
) -> std::io::Result<()> {
    if page > 1 {
        writeln!(w, "--- page {} ---", page)?;
    }
    for r in restaurants {
        print_restaurant(w, r, color)?;
    }
    Ok(())
}

fn print_restaurant(
    w: &mut dyn Write,
    r: &RestaurantRecord,
    color: ColorMode,
) -> std::io::Result<()> {
    if color.enabled() {
        writeln!(w, "{}", r.name.bold().cyan())?;
    } else {
        writeln!(w, "{}", r.name)?;
    }
    if let Some(site) = &r.website {
        writeln!(w, "   Visit Website: {}", site)?;
    }
    writeln!(w, "   {} \u{2022} {}", r.food_type, r.price)?;
    let rating = format_rating(r.rating, r.review_count);
    if color.enabled() {
        writeln!(w, "   {}", rating.yellow())?;
    } else {
        writeln!(w, "   {}", rating)?;
    }
    if let Some(url) = &r.google_maps_url {
        writeln!(w, "   Get Directions: {}", url)?;
    }
    writeln!(w)?;
    Ok(())
}

/// `4.6 (1,234)`, or `No rating` when the place has none.
pub fn format_rating(rating: Option<f64>, review_count: u64) -> String {
    match rating {
        Some(r) => format!("{:.1} ({})", r, group_thousands(review_count)),
        None => "No rating".to_string(),
    }
}

fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

pub fn print_no_match(w: &mut dyn Write, color: ColorMode) -> std::io::Result<()> {
    if color.enabled() {
        writeln!(w, "{}", NO_MATCH_HINT.yellow())?;
    } else {
        writeln!(w, "{}", NO_MATCH_HINT)?;
    }
    Ok(())
}

pub fn print_fetch_failed(
    w: &mut dyn Write,
    message: &str,
    color: ColorMode,
) -> std::io::Result<()> {
    let line = format!("Could not load restaurants: {}", message);
    if color.enabled() {
        writeln!(w, "{}", line.red())?;
    } else {
        writeln!(w, "{}", line)?;
    }
    Ok(())
}

pub fn print_more_prompt(w: &mut dyn Write, color: ColorMode) -> std::io::Result<()> {
    let prompt = "Press Enter to show more, or q to quit: ";
    if color.enabled() {
        write!(w, "{}", prompt.dimmed())
    } else {
        write!(w, "{}", prompt)
    }
}

pub fn print_cuisines(w: &mut dyn Write) -> std::io::Result<()> {
    for cuisine in CUISINES {
        writeln!(w, "{}", cuisine)?;
    }
    Ok(())
}
