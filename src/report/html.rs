//! HTML dashboard with D3.js drawing of precomputed chart geometry
//!
//! All layout happens in Rust; the page only maps the geometry to SVG.
//! Chord arcs and ribbons use d3's angle convention directly, tree and seat
//! coordinates are scaled into each panel.

use super::{AnalysisReport, Summary};
use serde::Serialize;
use std::io::{self, Write};

#[derive(Serialize)]
struct PageData<'a> {
    summary: Summary,
    reports: &'a [AnalysisReport],
}

pub fn write<W: Write>(writer: &mut W, reports: &[AnalysisReport]) -> io::Result<()> {
    let data = PageData { summary: Summary::from_reports(reports), reports };
    let json_data = script_safe(&serde_json::to_string(&data).map_err(io::Error::other)?);
    let title = match reports {
        [single] => html_escape(single.display_name()),
        _ => format!("{} results", reports.len()),
    };

    write!(writer, r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>SmartScore: {title}</title>
    <script src="https://d3js.org/d3.v7.min.js"></script>
    <style>
        :root {{
            --bg: #0d1117;
            --card: #161b22;
            --border: #30363d;
            --text: #e6edf3;
            --dim: #7d8590;
            --purple: #9F1B7F;
            --pink: #DA3361;
            --coral: #F6504E;
            --orange: #F29D37;
            --yellow: #FFC500;
        }}
        * {{ box-sizing: border-box; margin: 0; padding: 0; }}
        body {{
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', 'Noto Sans', Helvetica, Arial, sans-serif;
            background: var(--bg);
            color: var(--text);
            line-height: 1.5;
        }}
        .container {{ max-width: 1600px; margin: 0 auto; padding: 2rem; }}

        /* Header */
        .header {{
            display: flex;
            align-items: baseline;
            gap: 1rem;
            margin-bottom: 2rem;
            padding-bottom: 1rem;
            border-bottom: 1px solid var(--border);
        }}
        .logo {{
            font-size: 2.5rem;
            font-weight: 800;
            background: linear-gradient(135deg, var(--orange), var(--purple));
            -webkit-background-clip: text;
            -webkit-text-fill-color: transparent;
        }}
        .subtitle {{ color: var(--dim); font-size: 1rem; }}

        /* Stats Row */
        .stats {{
            display: grid;
            grid-template-columns: repeat(auto-fit, minmax(180px, 1fr));
            gap: 1rem;
            margin-bottom: 2rem;
        }}
        .stat {{
            background: var(--card);
            border: 1px solid var(--border);
            border-radius: 12px;
            padding: 1.25rem;
            text-align: center;
        }}
        .stat-value {{ font-size: 2.25rem; font-weight: 700; line-height: 1; color: var(--yellow); }}
        .stat-label {{ color: var(--dim); font-size: 0.8rem; text-transform: uppercase; letter-spacing: 0.05em; margin-top: 0.5rem; }}

        /* Metric grid */
        .source {{ font-size: 1.4rem; margin: 2rem 0 1rem; }}
        .grid {{ display: grid; grid-template-columns: repeat(auto-fill, minmax(420px, 1fr)); gap: 1.5rem; }}
        .chart-card {{
            background: var(--card);
            border: 1px solid var(--border);
            border-radius: 12px;
            padding: 1.25rem;
        }}
        .chart-title {{ font-weight: 600; margin-bottom: 0.25rem; }}
        .chart-meta {{ color: var(--dim); font-size: 0.75rem; margin-bottom: 0.75rem; }}
        .notice {{ color: var(--coral); font-size: 0.85rem; margin-bottom: 0.5rem; }}
        .no-data {{ color: var(--dim); font-style: italic; padding: 2rem 0; text-align: center; }}
        pre {{ color: var(--dim); font-size: 0.75rem; max-height: 240px; overflow: auto; }}
        svg text {{ fill: var(--text); font-size: 10px; }}

        .footer {{ color: var(--dim); text-align: center; margin-top: 3rem; font-size: 0.85rem; }}
    </style>
</head>
<body>
    <div class="container">
        <div class="header">
            <div class="logo">SmartScore</div>
            <div class="subtitle">{title}</div>
        </div>
        <div class="stats" id="stats"></div>
        <div id="reports"></div>
        <div class="footer">Generated by SmartScore</div>
    </div>

    <script>
    const data = {json_data};
    const palette = ['#9F1B7F', '#DA3361', '#F6504E', '#F29D37', '#FFC500'];
    const sectionColors = {{ strings: '#9F1B7F', woodwinds: '#F6504E', brass: '#F29D37', percussion: '#FFC500' }};
    const bandColors = {{ very_high: '#F6504E', high: '#F29D37', medium: '#FFC500', low: '#DA3361', minimal: '#9F1B7F' }};

    function drawStats() {{
        const s = data.summary;
        const stats = [
            ['Results', s.results], ['Metrics', s.metrics], ['Charted', s.charted],
            ['No data', s.no_data], ['Backend errors', s.backend_errors], ['Export rows', s.rows]
        ];
        const root = d3.select('#stats');
        stats.forEach(([label, value]) => {{
            const card = root.append('div').attr('class', 'stat');
            card.append('div').attr('class', 'stat-value').text(value);
            card.append('div').attr('class', 'stat-label').text(label);
        }});
    }}

    function svgIn(el, width, height) {{
        return el.append('svg').attr('width', width).attr('height', height);
    }}

    function drawScalar(el, chart) {{
        el.append('div').attr('class', 'stat-value').text(d3.format('~r')(chart.value));
    }}

    function drawBars(el, chart) {{
        const width = 380, height = 220, m = 28;
        const svg = svgIn(el, width, height);
        const values = chart.values;
        if (chart.style === 'pie' || chart.style === 'doughnut') {{
            const r = Math.min(width, height) / 2 - 10;
            const g = svg.append('g').attr('transform', `translate(${{width/2}},${{height/2}})`);
            const arc = d3.arc().innerRadius(chart.style === 'doughnut' ? r * 0.55 : 0).outerRadius(r);
            g.selectAll('path').data(d3.pie().sort(null)(values)).enter().append('path')
                .attr('d', arc).attr('fill', (d, i) => palette[i % palette.length]).attr('stroke', '#0d1117')
                .append('title').text((d, i) => `${{chart.labels[i]}}: ${{values[i]}}`);
            return;
        }}
        const x = d3.scaleBand().domain(chart.labels).range([m, width - 8]).padding(0.15);
        const y = d3.scaleLinear().domain([0, d3.max(values) || 1]).nice().range([height - m, 8]);
        svg.selectAll('rect').data(values).enter().append('rect')
            .attr('x', (d, i) => x(chart.labels[i])).attr('width', x.bandwidth())
            .attr('y', d => y(d)).attr('height', d => y(0) - y(d))
            .attr('fill', (d, i) => palette[i % palette.length])
            .append('title').text((d, i) => `${{chart.labels[i]}}: ${{d}}`);
        svg.append('g').attr('transform', `translate(0,${{height - m}})`).call(d3.axisBottom(x).tickSizeOuter(0));
        svg.append('g').attr('transform', `translate(${{m}},0)`).call(d3.axisLeft(y).ticks(4));
    }}

    function drawSeries(el, chart) {{
        const width = 380, height = 200, m = 28;
        const svg = svgIn(el, width, height);
        if (chart.cells && chart.cells.length) {{
            const size = (width - 2 * m) / 10;
            const color = d3.scaleSequential(d3.interpolateInferno).domain([0, 1]);
            svg.selectAll('rect').data(chart.cells).enter().append('rect')
                .attr('x', d => m + d.col * size).attr('y', d => 8 + d.row * size)
                .attr('width', size - 2).attr('height', size - 2)
                .attr('fill', d => color(d.normalized))
                .append('title').text(d => `${{d.key}}: ${{d.value}}`);
            return;
        }}
        const pts = chart.points;
        const x = d3.scaleLinear().domain(d3.extent(pts, p => p.unit)).range([m, width - 8]);
        const y = d3.scaleLinear().domain([0, d3.max(pts, p => p.value) || 1]).nice().range([height - m, 8]);
        if (chart.style === 'bar') {{
            const w = Math.max(1, (width - m) / pts.length - 1);
            svg.selectAll('rect').data(pts).enter().append('rect')
                .attr('x', p => x(p.unit) - w / 2).attr('width', w)
                .attr('y', p => y(p.value)).attr('height', p => y(0) - y(p.value)).attr('fill', palette[3]);
        }} else {{
            svg.append('path').datum(pts).attr('fill', 'none').attr('stroke', palette[2]).attr('stroke-width', 2)
                .attr('d', d3.line().x(p => x(p.unit)).y(p => y(p.value)));
        }}
        svg.append('g').attr('transform', `translate(0,${{height - m}})`).call(d3.axisBottom(x).ticks(10));
        svg.append('g').attr('transform', `translate(${{m}},0)`).call(d3.axisLeft(y).ticks(4));
    }}

    function drawChord(el, chart) {{
        const size = 380, outer = size / 2 - 40, inner = outer - 14;
        const g = svgIn(el, size, size).append('g').attr('transform', `translate(${{size/2}},${{size/2}})`);
        const color = d3.scaleOrdinal(palette);
        const arc = d3.arc().innerRadius(inner).outerRadius(outer);
        const ribbon = chart.layout.directed ? d3.ribbonArrow().radius(inner - 1) : d3.ribbon().radius(inner - 1);
        // Ribbons come heaviest first; draw lightest last so it stays visible
        g.append('g').attr('fill-opacity', 0.7).selectAll('path').data(chart.layout.ribbons.slice().reverse())
            .enter().append('path')
            .attr('d', r => ribbon({{
                source: {{ startAngle: r.source.start_angle, endAngle: r.source.end_angle }},
                target: {{ startAngle: r.target.start_angle, endAngle: r.target.end_angle }}
            }}))
            .attr('fill', r => color(r.source.label))
            .append('title').text(r => `${{r.source.label}} → ${{r.target.label}}: ${{r.weight}}`);
        const groups = g.append('g').selectAll('g').data(chart.layout.groups).enter().append('g');
        groups.append('path')
            .attr('d', d => arc({{ startAngle: d.start_angle, endAngle: d.end_angle }}))
            .attr('fill', d => color(d.label));
        groups.append('text')
            .attr('transform', d => {{
                const a = (d.start_angle + d.end_angle) / 2;
                return `rotate(${{a * 180 / Math.PI - 90}}) translate(${{outer + 6}}) ${{a > Math.PI ? 'rotate(180)' : ''}}`;
            }})
            .attr('text-anchor', d => (d.start_angle + d.end_angle) / 2 > Math.PI ? 'end' : 'start')
            .attr('dy', '0.35em')
            .text(d => d.label);
    }}

    function drawTree(el, chart) {{
        const width = 400, height = 320, pad = 24;
        const nodes = chart.nodes;
        const xs = nodes.flatMap(n => [n.start.x, n.end.x]), ys = nodes.flatMap(n => [n.start.y, n.end.y]);
        const x = d3.scaleLinear().domain(d3.extent(xs)).range([pad, width - pad]);
        const y = d3.scaleLinear().domain(d3.extent(ys)).range([height - pad, pad]);
        const svg = svgIn(el, width, height);
        svg.selectAll('line').data(nodes).enter().append('line')
            .attr('x1', n => x(n.start.x)).attr('y1', n => y(n.start.y))
            .attr('x2', n => x(n.end.x)).attr('y2', n => y(n.end.y))
            .attr('stroke', n => bandColors[n.band]).attr('stroke-width', n => n.line_width)
            .attr('stroke-opacity', n => 0.5 + n.similarity * 0.5);
        svg.selectAll('circle').data(nodes).enter().append('circle')
            .attr('cx', n => x(n.end.x)).attr('cy', n => y(n.end.y)).attr('r', n => n.radius / 2)
            .attr('fill', n => bandColors[n.band]).attr('fill-opacity', 0.5);
        svg.selectAll('text.label').data(nodes.filter(n => n.labeled)).enter().append('text')
            .attr('x', n => x(n.end.x)).attr('y', n => y(n.end.y) - n.radius / 2 - 4)
            .attr('text-anchor', 'middle').text(n => n.name);
    }}

    function drawDensity(el, chart) {{
        const width = 400, height = 260;
        const svg = svgIn(el, width, height);
        svg.selectAll('circle').data(chart.marks).enter().append('circle')
            .attr('cx', d => d.x * width).attr('cy', d => d.y * height).attr('r', d => d.radius)
            .attr('fill', d => sectionColors[d.section]).attr('fill-opacity', d => d.color_weight)
            .attr('stroke', d => sectionColors[d.section]).attr('stroke-width', 2);
        svg.selectAll('text').data(chart.marks).enter().append('text')
            .attr('x', d => d.x * width).attr('y', d => d.y * height + d.radius + 12)
            .attr('text-anchor', 'middle').text(d => d.instrument);
    }}

    function drawNetwork(el, chart) {{
        const width = 400, height = 300;
        const svg = svgIn(el, width, height);
        svg.selectAll('line').data(chart.links).enter().append('line')
            .attr('x1', l => l.from.x * width).attr('y1', l => l.from.y * height)
            .attr('x2', l => l.to.x * width).attr('y2', l => l.to.y * height)
            .attr('stroke', palette[1]).attr('stroke-width', l => l.line_width).attr('stroke-opacity', l => l.normalized);
        svg.selectAll('path.arrow').data(chart.links).enter().append('path')
            .attr('d', l => {{
                const a = l.arrow, tx = a.tip.x * width, ty = a.tip.y * height;
                const w1 = [tx - a.length * Math.cos(a.heading - a.wing), ty - a.length * Math.sin(a.heading - a.wing)];
                const w2 = [tx - a.length * Math.cos(a.heading + a.wing), ty - a.length * Math.sin(a.heading + a.wing)];
                return `M${{tx}},${{ty}}L${{w1}}L${{w2}}Z`;
            }})
            .attr('fill', palette[1]);
        svg.selectAll('circle').data(chart.nodes).enter().append('circle')
            .attr('cx', n => n.x * width).attr('cy', n => n.y * height).attr('r', n => n.radius)
            .attr('fill', n => sectionColors[n.section]).attr('fill-opacity', 0.5);
        svg.selectAll('text').data(chart.nodes).enter().append('text')
            .attr('x', n => n.x * width).attr('y', n => n.y * height + n.radius + 12)
            .attr('text-anchor', 'middle').text(n => n.instrument);
    }}

    function drawChart(el, metric) {{
        const chart = metric.chart;
        switch (chart.kind) {{
            case 'scalar': return drawScalar(el, chart);
            case 'bars': return drawBars(el, chart);
            case 'series': return drawSeries(el, chart);
            case 'chord': return drawChord(el, chart);
            case 'tree': return drawTree(el, chart);
            case 'density': return drawDensity(el, chart);
            case 'network': return drawNetwork(el, chart);
            case 'composite':
                chart.children.forEach(child => drawCard(el, child));
                return;
            case 'raw':
                if (chart.notice) el.append('div').attr('class', 'notice').text(chart.notice);
                el.append('pre').text(JSON.stringify(chart.value, null, 2));
                return;
            default:
                el.append('div').attr('class', 'no-data').text('No data');
        }}
    }}

    function drawCard(parent, metric) {{
        const card = parent.append('div').attr('class', 'chart-card');
        card.append('div').attr('class', 'chart-title').text(metric.name.replace(/_/g, ' '));
        card.append('div').attr('class', 'chart-meta').text(`${{metric.path}} · ${{metric.shape}} · ${{metric.style}}`);
        drawChart(card, metric);
    }}

    function drawReports() {{
        const root = d3.select('#reports');
        data.reports.forEach(report => {{
            root.append('div').attr('class', 'source').text(report.source || 'metricas');
            const grid = root.append('div').attr('class', 'grid');
            report.charts.forEach(metric => drawCard(grid, metric));
        }});
    }}

    drawStats();
    drawReports();
    </script>
</body>
</html>
"#)
}

/// Keep embedded JSON from closing the script element
fn script_safe(json: &str) -> String {
    json.replace("</", "<\\/")
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_report(source: &str) -> AnalysisReport {
        AnalysisReport {
            source: Some(source.to_string()),
            category: None,
            generated_at: "2024-01-01 00:00:00".to_string(),
            summary: vec![],
            rows: vec![],
            charts: vec![],
        }
    }

    #[test]
    fn test_page_embeds_data_and_draws() {
        let mut out = Vec::new();
        write(&mut out, &[empty_report("coriolan.mid")]).unwrap();
        let html = String::from_utf8(out).unwrap();
        assert!(html.contains("<title>SmartScore: coriolan.mid</title>"));
        assert!(html.contains("\"source\":\"coriolan.mid\""));
        assert!(html.contains("drawReports();"));
    }

    #[test]
    fn test_script_breakout_escaped() {
        let mut out = Vec::new();
        write(&mut out, &[empty_report("</script><b>")]).unwrap();
        let html = String::from_utf8(out).unwrap();
        assert!(!html.contains("</script><b>"));
        assert!(html.contains("&lt;/script&gt;&lt;b&gt;"));
    }
}
