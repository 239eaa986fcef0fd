use std::fmt::Write;

use farmacia_domain::cart::{CartView, Event};

/// Plain-text table of the cart, with a placeholder row when empty.
pub fn table<D>(view: &CartView<D>) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:>3}  {:<36} {:<12} {:>6} {:>10} {:>12}",
        "#", "Medication", "Lot", "Qty", "Price", "Total"
    );

    if view.is_empty() {
        let _ = writeln!(out, "     (no items)");
    }

    for row in &view.rows {
        let price = row.unit_price.map(|p| p.round_dp(2).to_string()).unwrap_or("-".to_string());
        let total = row.total.map(|t| t.round_dp(2).to_string()).unwrap_or("-".to_string());
        let _ = writeln!(
            out,
            "{:>3}  {:<36} {:<12} {:>6} {:>10} {:>12}",
            row.position,
            truncate(&row.label, 36),
            row.lot_code.as_deref().unwrap_or("-"),
            row.quantity,
            price,
            total
        );
    }

    let _ = write!(out, "Total: {} ({})", view.total.round_dp(2), view.status);
    out
}

/// Renderer installed on the cart: one line for the event, then the table.
pub fn print_event<D>(event: &Event<D>, view: &CartView<D>) {
    match event {
        Event::ItemAdded { item, .. } => println!("Added {} x{}", item.display_label, item.quantity),
        Event::ItemRemoved { index, .. } => println!("Removed row {}", index + 1),
        Event::CartCleared => println!("List cleared"),
        Event::CommitStarted { .. } => println!("Saving..."),
        Event::CommitSucceeded { .. } => {}
        Event::CommitFailed { message, .. } => println!("Save failed: {}", message),
    }
    if !matches!(event, Event::CommitStarted { .. }) {
        println!("{}", table(view));
    }
}

fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        return s.to_string();
    }
    let mut cut: String = s.chars().take(width.saturating_sub(1)).collect();
    cut.push('~');
    cut
}
