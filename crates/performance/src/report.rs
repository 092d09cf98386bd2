use std::fmt::Write as _;

use crate::metrics::PerformanceMetrics;

fn pct(value: f64) -> String {
    format!("{:.2}%", value * 100.0)
}

/// Plain text performance report for one strategy
pub fn render_report(strategy_id: &str, metrics: &PerformanceMetrics) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Performance report: {}", strategy_id);
    if let (Some(start), Some(end)) = (metrics.start, metrics.end) {
        let _ = writeln!(
            out,
            "Period: {} .. {} ({} periods)",
            start.format("%Y-%m-%d %H:%M"),
            end.format("%Y-%m-%d %H:%M"),
            metrics.periods
        );
    }
    let _ = writeln!(
        out,
        "Equity: {:.2} -> {:.2}",
        metrics.initial_equity, metrics.final_equity
    );

    let _ = writeln!(out, "\nReturns");
    let _ = writeln!(out, "  Total return        {:>12}", pct(metrics.total_return));
    let _ = writeln!(out, "  Annual return       {:>12}", pct(metrics.annual_return));
    let _ = writeln!(out, "  Best period         {:>12}", pct(metrics.best_period));
    let _ = writeln!(out, "  Worst period        {:>12}", pct(metrics.worst_period));
    let _ = writeln!(out, "  Positive periods    {:>12}", pct(metrics.positive_periods));

    let _ = writeln!(out, "\nRisk");
    let _ = writeln!(out, "  Volatility          {:>12}", pct(metrics.volatility));
    let _ = writeln!(out, "  Downside volatility {:>12}", pct(metrics.downside_volatility));
    let _ = writeln!(out, "  Max drawdown        {:>12}", pct(metrics.max_drawdown));
    let _ = writeln!(out, "  Max DD duration     {:>12}", metrics.max_drawdown_duration);
    let _ = writeln!(out, "  Current drawdown    {:>12}", pct(metrics.current_drawdown));
    let _ = writeln!(out, "  VaR                 {:>12}", pct(metrics.var));
    let _ = writeln!(out, "  CVaR                {:>12}", pct(metrics.cvar));
    let _ = writeln!(out, "  Skewness            {:>12.4}", metrics.skewness);
    let _ = writeln!(out, "  Kurtosis            {:>12.4}", metrics.kurtosis);
    let _ = writeln!(out, "  Tail ratio          {:>12.4}", metrics.tail_ratio);

    let _ = writeln!(out, "\nRisk-adjusted");
    let _ = writeln!(out, "  Sharpe              {:>12.4}", metrics.sharpe_ratio);
    let _ = writeln!(out, "  Sortino             {:>12.4}", metrics.sortino_ratio);
    let _ = writeln!(out, "  Calmar              {:>12.4}", metrics.calmar_ratio);

    let trades = &metrics.trades;
    let _ = writeln!(out, "\nTrades");
    let _ = writeln!(
        out,
        "  Closed              {:>12} ({} won, {} lost)",
        trades.total_trades, trades.winning_trades, trades.losing_trades
    );
    let _ = writeln!(out, "  Win rate            {:>12}", pct(trades.win_rate));
    let _ = writeln!(out, "  Profit factor       {:>12.4}", trades.profit_factor);
    let _ = writeln!(out, "  Avg win / loss      {:>12.2} / {:.2}", trades.avg_win, trades.avg_loss);
    let _ = writeln!(
        out,
        "  Largest win / loss  {:>12.2} / {:.2}",
        trades.largest_win, trades.largest_loss
    );
    let _ = writeln!(
        out,
        "  Streaks (win/loss)  {:>12} / {}",
        trades.max_consecutive_wins, trades.max_consecutive_losses
    );
    let _ = writeln!(out, "  Commission          {:>12.2}", trades.total_commission);

    if let Some(benchmark) = &metrics.benchmark {
        let _ = writeln!(out, "\nBenchmark");
        let _ = writeln!(out, "  Benchmark return    {:>12}", pct(benchmark.benchmark_return));
        let _ = writeln!(out, "  Alpha               {:>12}", pct(benchmark.alpha));
        let _ = writeln!(out, "  Beta                {:>12.4}", benchmark.beta);
        let _ = writeln!(out, "  Correlation         {:>12.4}", benchmark.correlation);
        let _ = writeln!(out, "  Tracking error      {:>12}", pct(benchmark.tracking_error));
        let _ = writeln!(out, "  Information ratio   {:>12.4}", benchmark.information_ratio);
    }
    out
}
