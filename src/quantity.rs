// Adapted from https://github.com/sombralibre/k8s-quantity-parser
//
// Original license:
//
// MIT License
//
// Copyright (c) 2022 Alejandro Llanes
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.

use color_eyre::{eyre::eyre, Report, Result};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use regex::Regex;

#[allow(non_camel_case_types)]
enum QuantityMemoryUnits {
    Ki,
    Mi,
    Gi,
    Ti,
    Pi,
    Ei,
    k,
    M,
    G,
    T,
    P,
    E,
    m,
    Invalid,
}

impl QuantityMemoryUnits {
    fn new(unit: &str) -> Self {
        match unit {
            "Ki" => Self::Ki,
            "Mi" => Self::Mi,
            "Gi" => Self::Gi,
            "Ti" => Self::Ti,
            "Pi" => Self::Pi,
            "Ei" => Self::Ei,
            "k" => Self::k,
            "M" => Self::M,
            "G" => Self::G,
            "T" => Self::T,
            "P" => Self::P,
            "E" => Self::E,
            "m" => Self::m,
            _ => Self::Invalid,
        }
    }
}

/// Parses the values retrieved from `BTreeMap<String, Quantity>` collections
/// on `k8s_openapi::api::core::v1::Pod` and `k8s_openapi::api::core::v1::Node`
/// into exact integer counts — milli-cpus or bytes.
///
/// # Errors
/// Fails on an unrecognised unit suffix or a value that doesn't parse as an
/// integer.
pub trait QuantityExt {
    /// Parses a CPU quantity (`"4"`, `"1536m"`, …) into milli-cpus.
    ///
    /// ```rust
    /// # use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
    /// # use dc_stateful_scheduler::quantity::QuantityExt;
    /// let cpu = Quantity("4".into());
    /// assert_eq!(cpu.to_milli_cpus().ok().flatten().unwrap(), 4000);
    /// ```
    fn to_milli_cpus(&self) -> Result<Option<i64>, Report>;

    /// Parses a memory quantity (`"1Mi"`, `"1G"`, …) into bytes.
    ///
    /// ```rust
    /// # use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
    /// # use dc_stateful_scheduler::quantity::QuantityExt;
    /// let mib = Quantity("1Mi".into());
    /// assert_eq!(mib.to_bytes().ok().flatten().unwrap(), 1048576);
    /// ```
    fn to_bytes(&self) -> Result<Option<i64>, Report>;
}

impl QuantityExt for Quantity {
    fn to_milli_cpus(&self) -> Result<Option<i64>, Report> {
        let unit_str = &self.0;
        let rgx = Regex::new(r"([m]{1}$)")?;
        let cap = rgx.captures(unit_str);
        if cap.is_none() {
            return Ok(Some(unit_str.parse::<i64>()? * 1000));
        };
        let mt = cap.unwrap().get(0).unwrap();
        let unit_str = unit_str.replace(mt.as_str(), "");
        Ok(Some(unit_str.parse::<i64>()?))
    }

    fn to_bytes(&self) -> Result<Option<i64>, Report> {
        let unit_str = &self.0;
        let rgx = Regex::new(r"([[:alpha:]]{1,2}$)")?;
        let cap = rgx.captures(unit_str);

        if cap.is_none() {
            return Ok(Some(unit_str.parse::<i64>()?));
        };

        // Is safe to use unwrap here, as the value is already checked.
        match cap.unwrap().get(0) {
            Some(m) => match QuantityMemoryUnits::new(m.as_str()) {
                QuantityMemoryUnits::Ki => {
                    let unit_str = unit_str.replace(m.as_str(), "");
                    let amount = unit_str.parse::<i64>()?;
                    Ok(Some(amount * 1024))
                }
                QuantityMemoryUnits::Mi => {
                    let unit_str = unit_str.replace(m.as_str(), "");
                    let amount = unit_str.parse::<i64>()?;
                    Ok(Some((amount * 1024) * 1024))
                }
                QuantityMemoryUnits::Gi => {
                    let unit_str = unit_str.replace(m.as_str(), "");
                    let amount = unit_str.parse::<i64>()?;
                    Ok(Some(((amount * 1024) * 1024) * 1024))
                }
                QuantityMemoryUnits::Ti => {
                    let unit_str = unit_str.replace(m.as_str(), "");
                    let amount = unit_str.parse::<i64>()?;
                    Ok(Some((((amount * 1024) * 1024) * 1024) * 1024))
                }
                QuantityMemoryUnits::Pi => {
                    let unit_str = unit_str.replace(m.as_str(), "");
                    let amount = unit_str.parse::<i64>()?;
                    Ok(Some(((((amount * 1024) * 1024) * 1024) * 1024) * 1024))
                }
                QuantityMemoryUnits::Ei => {
                    let unit_str = unit_str.replace(m.as_str(), "");
                    let amount = unit_str.parse::<i64>()?;
                    Ok(Some(
                        (((((amount * 1024) * 1024) * 1024) * 1024) * 1024) * 1024,
                    ))
                }
                QuantityMemoryUnits::k => {
                    let unit_str = unit_str.replace(m.as_str(), "");
                    let amount = unit_str.parse::<i64>()?;
                    Ok(Some(amount * 1000))
                }
                QuantityMemoryUnits::M => {
                    let unit_str = unit_str.replace(m.as_str(), "");
                    let amount = unit_str.parse::<i64>()?;
                    Ok(Some((amount * 1000) * 1000))
                }
                QuantityMemoryUnits::G => {
                    let unit_str = unit_str.replace(m.as_str(), "");
                    let amount = unit_str.parse::<i64>()?;
                    Ok(Some(((amount * 1000) * 1000) * 1000))
                }
                QuantityMemoryUnits::T => {
                    let unit_str = unit_str.replace(m.as_str(), "");
                    let amount = unit_str.parse::<i64>()?;
                    Ok(Some((((amount * 1000) * 1000) * 1000) * 1000))
                }
                QuantityMemoryUnits::P => {
                    let unit_str = unit_str.replace(m.as_str(), "");
                    let amount = unit_str.parse::<i64>()?;
                    Ok(Some(((((amount * 1000) * 1000) * 1000) * 1000) * 1000))
                }
                QuantityMemoryUnits::E => {
                    let unit_str = unit_str.replace(m.as_str(), "");
                    let amount = unit_str.parse::<i64>()?;
                    Ok(Some(
                        (((((amount * 1000) * 1000) * 1000) * 1000) * 1000) * 1000,
                    ))
                }
                QuantityMemoryUnits::m => {
                    let unit_str = unit_str.replace(m.as_str(), "");
                    let amount = unit_str.parse::<i64>()?;
                    Ok(Some(amount / 1000))
                }
                QuantityMemoryUnits::Invalid => Err(eyre!("Invalid unit")),
            },
            None => Ok(None),
        }
    }
}
