//! Built-in dashboard templates.
//!
//! A [`Template`] names the logical fields it needs (`region`,
//! `salesRevenue`, ...) and describes its charts in terms of those fields. A
//! [`ColumnMapping`] assigns each field a column of the loaded data;
//! [`Template::charts_for`] substitutes the columns and drops every chart left
//! without a dimension or without any measure.

use std::{collections::BTreeMap, fmt};

use anyhow::{Result, anyhow, bail};
use serde::Serialize;

use crate::config::{ChartConfig, ChartKind};

/// Template field key → data column.
pub type ColumnMapping = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldRole {
    Dimension,
    Measure,
    Time,
}

impl fmt::Display for FieldRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FieldRole::Dimension => "dimension",
            FieldRole::Measure => "measure",
            FieldRole::Time => "time",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TemplateField {
    pub key: &'static str,
    pub label: &'static str,
    pub description: &'static str,
    pub role: FieldRole,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateChart {
    pub title: &'static str,
    pub kind: ChartKind,
    pub dimension_key: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimension2_key: Option<&'static str>,
    pub measure_keys: &'static [&'static str],
    pub stacked: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Template {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub fields: &'static [TemplateField],
    pub charts: &'static [TemplateChart],
}

const fn field(
    key: &'static str,
    label: &'static str,
    description: &'static str,
    role: FieldRole,
) -> TemplateField {
    TemplateField {
        key,
        label,
        description,
        role,
    }
}

const fn chart(
    title: &'static str,
    kind: ChartKind,
    dimension_key: &'static str,
    measure_keys: &'static [&'static str],
) -> TemplateChart {
    TemplateChart {
        title,
        kind,
        dimension_key,
        dimension2_key: None,
        measure_keys,
        stacked: false,
    }
}

use FieldRole::{Dimension, Measure, Time};

pub static TEMPLATES: &[Template] = &[
    Template {
        id: "sales-analytics",
        name: "Sales Analytics",
        description: "Sales performance, revenue and key sales metrics across regions and product categories.",
        fields: &[
            field("orderDate", "Order Date", "The date when the order was placed.", Time),
            field("region", "Region", "Geographical region of the sale.", Dimension),
            field("productCategory", "Product Category", "The category of the product sold.", Dimension),
            field("salesRevenue", "Sales Revenue", "The total monetary value of the sale.", Measure),
            field("unitsSold", "Units Sold", "The number of units sold.", Measure),
        ],
        charts: &[
            chart("Sales Revenue by Region", ChartKind::Bar, "region", &["salesRevenue"]),
            chart("Sales by Category", ChartKind::Pie, "productCategory", &["salesRevenue"]),
            chart("Sales Trend Over Time", ChartKind::Line, "orderDate", &["salesRevenue"]),
        ],
    },
    Template {
        id: "marketing-performance",
        name: "Marketing Performance",
        description: "Campaign effectiveness through leads, conversions and cost per acquisition.",
        fields: &[
            field("campaignDate", "Campaign Date", "Date of the marketing activity.", Time),
            field("channel", "Marketing Channel", "The channel used for the campaign.", Dimension),
            field("impressions", "Impressions", "Total number of times the ad was displayed.", Measure),
            field("clicks", "Clicks", "Total number of clicks on the ad.", Measure),
            field("conversions", "Conversions", "Number of desired actions taken.", Measure),
        ],
        charts: &[
            chart("Conversions Funnel", ChartKind::Funnel, "channel", &["conversions"]),
            chart(
                "Campaign Performance Over Time",
                ChartKind::Area,
                "campaignDate",
                &["impressions", "clicks"],
            ),
        ],
    },
    Template {
        id: "population-analysis",
        name: "Population & Census",
        description: "Population distribution by area and age, with indicators such as income.",
        fields: &[
            field("censusYear", "Census Year", "The year the data was collected.", Time),
            field("geographicArea", "Geographic Area", "The region, state, or city for the data.", Dimension),
            field("ageGroup", "Age Group", "The demographic age bracket.", Dimension),
            field("totalPopulation", "Total Population", "The total population count.", Measure),
            field("medianIncome", "Median Income", "The median household income.", Measure),
        ],
        charts: &[
            chart("Population by Area", ChartKind::Treemap, "geographicArea", &["totalPopulation"]),
            chart(
                "Demographics Radar",
                ChartKind::Radar,
                "ageGroup",
                &["totalPopulation", "medianIncome"],
            ),
            chart("Population Growth Over Time", ChartKind::Line, "censusYear", &["totalPopulation"]),
        ],
    },
    Template {
        id: "public-health-analysis",
        name: "Public Health Analysis",
        description: "Public health indicators, disease trends and healthcare outcomes across populations.",
        fields: &[
            field("reportYear", "Report Year", "The year the health data was reported.", Time),
            field("location", "Location", "The county, state, or country for the health data.", Dimension),
            field("healthIndicator", "Health Indicator", "The specific health metric being measured.", Dimension),
            field("indicatorValue", "Indicator Value", "The numeric value of the health indicator.", Measure),
            field(
                "populationSize",
                "Population Size",
                "The size of the population to which the indicator applies.",
                Measure,
            ),
        ],
        charts: &[
            chart(
                "Indicator Value vs Population",
                ChartKind::Scatter,
                "location",
                &["populationSize", "indicatorValue"],
            ),
            chart("Indicator Trends Over Time", ChartKind::Line, "reportYear", &["indicatorValue"]),
        ],
    },
    Template {
        id: "education-statistics",
        name: "Education Statistics",
        description: "Graduation rates, enrollment numbers and student-teacher ratios by region.",
        fields: &[
            field("academicYear", "Academic Year", "The school year for which the data is reported.", Time),
            field("schoolDistrict", "School District", "The school district or specific school.", Dimension),
            field("studentDemographic", "Student Demographic", "The group of students being analyzed.", Dimension),
            field("graduationRate", "Graduation Rate", "The percentage of students who graduate.", Measure),
            field("enrollmentCount", "Enrollment Count", "The total number of students enrolled.", Measure),
        ],
        charts: &[
            chart("Graduation Rate by District", ChartKind::Bar, "schoolDistrict", &["graduationRate"]),
            chart("Enrollment by Demographic", ChartKind::Pie, "studentDemographic", &["enrollmentCount"]),
            chart("Enrollment Trends Over Time", ChartKind::Area, "academicYear", &["enrollmentCount"]),
        ],
    },
    Template {
        id: "project-management",
        name: "Project Management",
        description: "Project tasks, timelines and progress on a gantt schedule.",
        fields: &[
            field("taskName", "Task Name", "The name or description of the project task.", Dimension),
            field("startDate", "Start Date", "The date the task is scheduled to begin.", Time),
            field("endDate", "End Date", "The date the task is scheduled to be completed.", Time),
            field("status", "Status", "The current status of the task.", Dimension),
        ],
        charts: &[
            chart("Project Timeline", ChartKind::Gantt, "taskName", &["startDate", "endDate"]),
            chart("Tasks by Status", ChartKind::Pie, "status", &["taskName"]),
        ],
    },
];

pub fn find(id: &str) -> Option<&'static Template> {
    TEMPLATES.iter().find(|template| template.id == id.trim())
}

/// Looks up `id`, listing the known ids when it does not exist.
pub fn lookup(id: &str) -> Result<&'static Template> {
    find(id).ok_or_else(|| {
        let known = TEMPLATES.iter().map(|t| t.id).collect::<Vec<_>>();
        anyhow!("Unknown template '{id}' (available: {})", known.join(", "))
    })
}

/// Parses a `field=Column` assignment.
pub fn parse_assignment(value: &str) -> Result<(String, String), String> {
    let (field, column) = value
        .split_once('=')
        .ok_or_else(|| format!("Expected field=Column, got '{value}'"))?;
    let (field, column) = (field.trim(), column.trim());
    if field.is_empty() {
        return Err(format!("Missing field name in '{value}'"));
    }
    Ok((field.to_string(), column.to_string()))
}

impl Template {
    pub fn field(&self, key: &str) -> Option<&TemplateField> {
        self.fields.iter().find(|field| field.key == key)
    }

    /// Builds a mapping, rejecting keys the template does not declare.
    pub fn mapping<I>(&self, assignments: I) -> Result<ColumnMapping>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut mapping = ColumnMapping::new();
        for (key, column) in assignments {
            if self.field(&key).is_none() {
                let known = self.fields.iter().map(|f| f.key).collect::<Vec<_>>();
                bail!(
                    "Template '{}' has no field '{key}' (fields: {})",
                    self.id,
                    known.join(", ")
                );
            }
            mapping.insert(key, column);
        }
        Ok(mapping)
    }

    /// Fields with no column assigned.
    pub fn unmapped_fields<'a>(&'a self, mapping: &ColumnMapping) -> Vec<&'a TemplateField> {
        self.fields
            .iter()
            .filter(|field| resolve(mapping, field.key).is_none())
            .collect()
    }

    /// Chart configurations for `mapping`. Charts without a mapped dimension
    /// or without any mapped measure are left out.
    pub fn charts_for(&self, mapping: &ColumnMapping) -> Vec<ChartConfig> {
        self.charts
            .iter()
            .filter_map(|definition| {
                let dimension = resolve(mapping, definition.dimension_key)?;
                let measures = definition
                    .measure_keys
                    .iter()
                    .filter_map(|key| resolve(mapping, key))
                    .collect::<Vec<_>>();
                if measures.is_empty() {
                    return None;
                }
                let mut config = ChartConfig::new(definition.kind)
                    .titled(definition.title)
                    .dimension(dimension);
                config.dimension2 = definition
                    .dimension2_key
                    .and_then(|key| resolve(mapping, key))
                    .map(str::to_string);
                config.measures = measures.into_iter().map(str::to_string).collect();
                config.stacked = definition.stacked;
                Some(config)
            })
            .collect()
    }
}

fn resolve<'m>(mapping: &'m ColumnMapping, key: &str) -> Option<&'m str> {
    mapping
        .get(key)
        .map(|column| column.trim())
        .filter(|column| !column.is_empty())
}
