use anyhow::{Context, Result};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// 安装全局Prometheus指标记录器，返回渲染用的句柄
///
/// 调度器各处通过metrics门面上报计数和直方图，API层用句柄渲染
/// /metrics文本。进程内只能安装一次
pub fn init_metrics() -> Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .context("安装Prometheus指标记录器失败")?;
    Ok(handle)
}
