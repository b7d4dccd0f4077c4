//! OSCアドレスの生成
//!
//! ベースアドレス有無で2通り:
//! - `Templated`: `/skeleton{n}/{関節名}/{軸}`
//! - `Positional`: `{base}{n-3}`, `{base}{n-2}`, `{base}{n-1}` (x, y, z)
//!
//! 関節単位（3引数）のメッセージは `/skeleton{n}/{関節名}` と
//! `{base}{n}/{関節名}`。どちらもスケルトン番号を含む。
//!
//! Positional の番号は固定レイアウトに合わせたオフセットで、
//! アドレス文字列からは導けない。

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    pub fn name(self) -> &'static str {
        match self {
            Axis::X => "x",
            Axis::Y => "y",
            Axis::Z => "z",
        }
    }

    /// Positional モードでカウンタから引く値
    fn counter_offset(self) -> i32 {
        match self {
            Axis::X => 3,
            Axis::Y => 2,
            Axis::Z => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AddressMode {
    #[default]
    Templated,
    Positional { base: String },
}

impl AddressMode {
    /// ユーザー入力のベースアドレスから
    ///
    /// 空なら Templated。先頭に `/` が無ければ補う。
    pub fn from_base(address: &str) -> Self {
        let address = address.trim();
        if address.is_empty() {
            return AddressMode::Templated;
        }
        let base = if address.starts_with('/') {
            address.to_string()
        } else {
            format!("/{}", address)
        };
        AddressMode::Positional { base }
    }

    /// 軸ごとのメッセージアドレス
    pub fn axis_path(&self, counter: i32, joint: &str, axis: Axis) -> String {
        match self {
            AddressMode::Positional { base } => {
                format!("{}{}", base, counter - axis.counter_offset())
            }
            AddressMode::Templated => {
                format!("/skeleton{}/{}/{}", counter, joint, axis.name())
            }
        }
    }

    /// 値を含む表示用アドレス
    ///
    /// Templated は値をパス末尾に連結する (`/skeleton1/Head/x0.5`)。
    /// Positional はアドレスのみ。
    pub fn axis_address(&self, counter: i32, joint: &str, axis: Axis, value: f64) -> String {
        let path = self.axis_path(counter, joint, axis);
        match self {
            AddressMode::Positional { .. } => path,
            AddressMode::Templated => format!("{}{}", path, format_value(value)),
        }
    }

    /// 関節単位（3引数）メッセージのアドレス
    pub fn joint_path(&self, counter: i32, joint: &str) -> String {
        match self {
            AddressMode::Positional { base } => format!("{}{}/{}", base, counter, joint),
            AddressMode::Templated => format!("/skeleton{}/{}", counter, joint),
        }
    }

    /// 表示用の1軸分 (`address` または `address/value`)
    pub fn axis_entry(&self, counter: i32, joint: &str, axis: Axis, value: f64) -> String {
        let address = self.axis_address(counter, joint, axis, value);
        match self {
            AddressMode::Positional { .. } => format!("{}/{}", address, format_value(value)),
            AddressMode::Templated => address,
        }
    }
}

/// 小数点以下 `decimals` 桁に丸める（偶数丸め）
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round_ties_even() / factor
}

/// 最短表現（整数値は小数点なし）
pub fn format_value(value: f64) -> String {
    format!("{}", value)
}
