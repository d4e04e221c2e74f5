use crate::execution::PaperFill;
use crate::models::{OrderAction, OrderRole, Side};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// One closed round trip, entry fill to exit fill
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRecord {
    pub side: Side,
    pub entry_time: NaiveDateTime,
    pub exit_time: NaiveDateTime,
    pub entry_price: f64,
    pub exit_price: f64,
    pub quantity: u32,
    pub exit_role: OrderRole,
    pub points: f64,
    pub pnl: f64,
    pub holding_period_minutes: i64,
}

impl TradeRecord {
    pub fn from_fills(entry: &PaperFill, exit: &PaperFill, point_value: f64) -> Self {
        let side = match entry.action {
            OrderAction::Buy => Side::Long,
            OrderAction::Sell => Side::Short,
        };
        let points = match side {
            Side::Long => exit.price - entry.price,
            Side::Short => entry.price - exit.price,
        };

        Self {
            side,
            entry_time: entry.time,
            exit_time: exit.time,
            entry_price: entry.price,
            exit_price: exit.price,
            quantity: entry.quantity,
            exit_role: exit.role,
            points,
            pnl: points * entry.quantity as f64 * point_value,
            holding_period_minutes: (exit.time - entry.time).num_minutes(),
        }
    }
}

/// Results of one replayed session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMetrics {
    pub total_pnl: f64,
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub stop_exits: usize,
    pub target_exits: usize,
    pub open_quantity: i64,
    pub max_drawdown: f64,
    pub trades: Vec<TradeRecord>,
}

impl SessionMetrics {
    /// Pair fills into round trips in fill order
    ///
    /// A trailing entry without an exit is reported as open quantity.
    pub fn from_fills(fills: &[PaperFill], point_value: f64) -> Self {
        let mut trades = Vec::new();
        let mut open: Option<&PaperFill> = None;

        for fill in fills {
            match (open, fill.role) {
                (None, OrderRole::Entry) => open = Some(fill),
                (Some(entry), OrderRole::Target | OrderRole::Stop) => {
                    trades.push(TradeRecord::from_fills(entry, fill, point_value));
                    open = None;
                }
                (_, role) => {
                    tracing::warn!("Unpaired {:?} fill for order {}", role, fill.order_id);
                }
            }
        }

        let open_quantity = open.map_or(0, |entry| match entry.action {
            OrderAction::Buy => entry.quantity as i64,
            OrderAction::Sell => -(entry.quantity as i64),
        });

        let total_pnl = trades.iter().map(|t| t.pnl).sum();
        let winning_trades = trades.iter().filter(|t| t.pnl > 0.0).count();
        let losing_trades = trades.iter().filter(|t| t.pnl < 0.0).count();
        let stop_exits = trades.iter().filter(|t| t.exit_role == OrderRole::Stop).count();

        Self {
            total_pnl,
            total_trades: trades.len(),
            winning_trades,
            losing_trades,
            stop_exits,
            target_exits: trades.len() - stop_exits,
            open_quantity,
            max_drawdown: Self::calculate_drawdown(&trades),
            trades,
        }
    }

    /// Largest peak-to-trough drop in cumulative P&L
    fn calculate_drawdown(trades: &[TradeRecord]) -> f64 {
        let mut peak: f64 = 0.0;
        let mut current = 0.0;
        let mut max_dd: f64 = 0.0;

        for trade in trades {
            current += trade.pnl;
            peak = peak.max(current);
            max_dd = max_dd.max(peak - current);
        }
        max_dd
    }

    /// Print a formatted report to stdout
    pub fn print_report(&self) {
        println!("\n╔═══════════════════════════════════════════════════════╗");
        println!("║               SESSION REPLAY REPORT                   ║");
        println!("╚═══════════════════════════════════════════════════════╝\n");

        println!("📊 P&L SUMMARY");
        println!("  Realized P&L:          ${:.2}", self.total_pnl);
        println!("  Max Drawdown:          ${:.2}", self.max_drawdown);
        if self.open_quantity != 0 {
            println!("  Open Quantity:         {}", self.open_quantity);
        }

        println!("\n📈 TRADES");
        println!("  Total Trades:          {}", self.total_trades);
        println!(
            "  Winners / Losers:      {} / {}",
            self.winning_trades, self.losing_trades
        );
        println!(
            "  Target / Stop Exits:   {} / {}",
            self.target_exits, self.stop_exits
        );

        for trade in &self.trades {
            println!(
                "  {:?} {} @ {:.2} ({}) -> {:.2} ({}, {:?}): {:+.2} pts, ${:.2}",
                trade.side,
                trade.quantity,
                trade.entry_price,
                trade.entry_time.format("%H:%M"),
                trade.exit_price,
                trade.exit_time.format("%H:%M"),
                trade.exit_role,
                trade.points,
                trade.pnl
            );
        }

        println!("\n═════════════════════════════════════════════════════════\n");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn fill(minute: u32, role: OrderRole, action: OrderAction, price: f64) -> PaperFill {
        PaperFill {
            order_id: minute as i64,
            role,
            action,
            quantity: 1,
            price,
            time: NaiveDate::from_ymd_opt(2025, 3, 3)
                .unwrap()
                .and_hms_opt(8, minute, 0)
                .unwrap(),
        }
    }

    #[test]
    fn test_stop_then_target_round_trips() {
        let fills = vec![
            fill(0, OrderRole::Entry, OrderAction::Buy, 21005.0),
            fill(5, OrderRole::Stop, OrderAction::Sell, 20995.0),
            fill(10, OrderRole::Entry, OrderAction::Buy, 21005.0),
            fill(30, OrderRole::Target, OrderAction::Sell, 21025.0),
        ];

        let metrics = SessionMetrics::from_fills(&fills, 2.0);

        assert_eq!(metrics.total_trades, 2);
        assert_eq!(metrics.stop_exits, 1);
        assert_eq!(metrics.target_exits, 1);
        assert!((metrics.total_pnl - 20.0).abs() < 1e-9);
        assert!((metrics.max_drawdown - 20.0).abs() < 1e-9);
        assert_eq!(metrics.trades[1].holding_period_minutes, 20);
    }

    #[test]
    fn test_short_trade_points() {
        let fills = vec![
            fill(0, OrderRole::Entry, OrderAction::Sell, 20995.0),
            fill(20, OrderRole::Target, OrderAction::Buy, 20975.0),
        ];

        let metrics = SessionMetrics::from_fills(&fills, 2.0);
        assert_eq!(metrics.trades[0].side, Side::Short);
        assert_eq!(metrics.trades[0].points, 20.0);
        assert_eq!(metrics.winning_trades, 1);
    }

    #[test]
    fn test_breakeven_trade_is_neither_winner_nor_loser() {
        let fills = vec![
            fill(0, OrderRole::Entry, OrderAction::Buy, 21005.0),
            fill(15, OrderRole::Stop, OrderAction::Sell, 21005.0),
            fill(20, OrderRole::Entry, OrderAction::Buy, 21005.0),
            fill(25, OrderRole::Stop, OrderAction::Sell, 20995.0),
        ];

        let metrics = SessionMetrics::from_fills(&fills, 2.0);
        assert_eq!(metrics.total_trades, 2);
        assert_eq!(metrics.winning_trades, 0);
        assert_eq!(metrics.losing_trades, 1);
        assert_eq!(metrics.trades[0].pnl, 0.0);
    }

    #[test]
    fn test_open_entry_reported() {
        let fills = vec![fill(0, OrderRole::Entry, OrderAction::Sell, 20995.0)];

        let metrics = SessionMetrics::from_fills(&fills, 2.0);
        assert_eq!(metrics.total_trades, 0);
        assert_eq!(metrics.open_quantity, -1);
        assert_eq!(metrics.total_pnl, 0.0);
    }
}
