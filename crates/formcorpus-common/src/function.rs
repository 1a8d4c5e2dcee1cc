//! Built-in spreadsheet function registry.
//!
//! Function ids are 1-based positions in [`FUNCTION_NAMES`]. The id space is
//! 9 bits wide in the packed token code, so the table must stay below 512
//! entries. New names go at the end; existing positions never move.

use once_cell::sync::Lazy;
use rustc_hash::FxHashMap;

pub const MAX_FUNCTION_ID: u16 = 511;

/// Known function names, in id order.
pub static FUNCTION_NAMES: &[&str] = &[
    "ABS", "ACCRINT", "ACCRINTM", "ACOS", "ACOSH", "ACOT", "ACOTH", "ADDRESS", "AGGREGATE",
    "AMORDEGRC", "AMORLINC", "AND", "ARABIC", "AREAS", "ASC", "ASIN", "ASINH", "ATAN", "ATAN2",
    "ATANH", "AVEDEV", "AVERAGE", "AVERAGEA", "AVERAGEIF", "AVERAGEIFS", "BAHTTEXT", "BASE",
    "BESSELI", "BESSELJ", "BESSELK", "BESSELY", "BETADIST", "BETAINV", "BIN2DEC", "BIN2HEX",
    "BIN2OCT", "BINOMDIST", "BITAND", "BITLSHIFT", "BITOR", "BITRSHIFT", "BITXOR", "CEILING",
    "CELL", "CHAR", "CHIDIST", "CHIINV", "CHITEST", "CHOOSE", "CLEAN", "CODE", "COLUMN",
    "COLUMNS", "COMBIN", "COMBINA", "COMPLEX", "CONCAT", "CONCATENATE", "CONFIDENCE", "CONVERT",
    "CORREL", "COS", "COSH", "COT", "COTH", "COUNT", "COUNTA", "COUNTBLANK", "COUNTIF",
    "COUNTIFS", "COUPDAYBS", "COUPDAYS", "COUPDAYSNC", "COUPNCD", "COUPNUM", "COUPPCD", "COVAR",
    "CRITBINOM", "CSC", "CSCH", "CUMIPMT", "CUMPRINC", "DATE", "DATEDIF", "DATEVALUE", "DAVERAGE",
    "DAY", "DAYS", "DAYS360", "DB", "DCOUNT", "DCOUNTA", "DDB", "DEC2BIN", "DEC2HEX", "DEC2OCT",
    "DECIMAL", "DEGREES", "DELTA", "DEVSQ", "DGET", "DISC", "DMAX", "DMIN", "DOLLAR", "DOLLARDE",
    "DOLLARFR", "DPRODUCT", "DSTDEV", "DSTDEVP", "DSUM", "DURATION", "DVAR", "DVARP", "EDATE",
    "EFFECT", "EOMONTH", "ERF", "ERFC", "ERROR.TYPE", "EVEN", "EXACT", "EXP", "EXPONDIST", "FACT",
    "FACTDOUBLE", "FALSE", "FDIST", "FILTER", "FIND", "FINV", "FISHER", "FISHERINV", "FIXED",
    "FLOOR", "FORECAST", "FORMULATEXT", "FREQUENCY", "FTEST", "FV", "FVSCHEDULE", "GAMMADIST",
    "GAMMAINV", "GAMMALN", "GCD", "GEOMEAN", "GESTEP", "GETPIVOTDATA", "GROWTH", "HARMEAN",
    "HEX2BIN", "HEX2DEC", "HEX2OCT", "HLOOKUP", "HOUR", "HYPERLINK", "HYPGEOMDIST", "IF",
    "IFERROR", "IFNA", "IFS", "IMABS", "IMAGINARY", "IMARGUMENT", "IMCONJUGATE", "IMCOS", "IMDIV",
    "IMEXP", "IMLN", "IMLOG10", "IMLOG2", "IMPOWER", "IMPRODUCT", "IMREAL", "IMSIN", "IMSQRT",
    "IMSUB", "IMSUM", "INDEX", "INDIRECT", "INFO", "INT", "INTERCEPT", "INTRATE", "IPMT", "IRR",
    "ISBLANK", "ISERR", "ISERROR", "ISEVEN", "ISFORMULA", "ISLOGICAL", "ISNA", "ISNONTEXT",
    "ISNUMBER", "ISODD", "ISOWEEKNUM", "ISPMT", "ISREF", "ISTEXT", "KURT", "LARGE", "LCM", "LEFT",
    "LEN", "LET", "LINEST", "LN", "LOG", "LOG10", "LOGEST", "LOGINV", "LOGNORMDIST", "LOOKUP",
    "LOWER", "MATCH", "MAX", "MAXA", "MAXIFS", "MDETERM", "MDURATION", "MEDIAN", "MID", "MIN",
    "MINA", "MINIFS", "MINUTE", "MINVERSE", "MIRR", "MMULT", "MOD", "MODE", "MONTH", "MROUND",
    "MULTINOMIAL", "MUNIT", "N", "NA", "NEGBINOMDIST", "NETWORKDAYS", "NOMINAL", "NORMDIST",
    "NORMINV", "NORMSDIST", "NORMSINV", "NOT", "NOW", "NPER", "NPV", "NUMBERVALUE", "OCT2BIN",
    "OCT2DEC", "OCT2HEX", "ODD", "ODDFPRICE", "ODDFYIELD", "ODDLPRICE", "ODDLYIELD", "OFFSET",
    "OR", "PEARSON", "PERCENTILE", "PERCENTRANK", "PERMUT", "PHONETIC", "PI", "PMT", "POISSON",
    "POWER", "PPMT", "PRICE", "PRICEDISC", "PRICEMAT", "PROB", "PRODUCT", "PROPER", "PV",
    "QUARTILE", "QUOTIENT", "RADIANS", "RAND", "RANDARRAY", "RANDBETWEEN", "RANK", "RATE",
    "RECEIVED", "REPLACE", "REPT", "RIGHT", "ROMAN", "ROUND", "ROUNDDOWN", "ROUNDUP", "ROW",
    "ROWS", "RRI", "RSQ", "SEARCH", "SEC", "SECH", "SECOND", "SEQUENCE", "SERIESSUM", "SHEET",
    "SHEETS", "SIGN", "SIN", "SINH", "SKEW", "SLN", "SLOPE", "SMALL", "SORT", "SORTBY", "SQRT",
    "SQRTPI", "STANDARDIZE", "STDEV", "STDEVA", "STDEVP", "STDEVPA", "STEYX", "SUBSTITUTE",
    "SUBTOTAL", "SUM", "SUMIF", "SUMIFS", "SUMPRODUCT", "SUMSQ", "SUMX2MY2", "SUMX2PY2",
    "SUMXMY2", "SWITCH", "SYD", "T", "TAN", "TANH", "TBILLEQ", "TBILLPRICE", "TBILLYIELD",
    "TDIST", "TEXT", "TEXTJOIN", "TIME", "TIMEVALUE", "TINV", "TODAY", "TRANSPOSE", "TREND",
    "TRIM", "TRIMMEAN", "TRUE", "TRUNC", "TTEST", "TYPE", "UNICHAR", "UNICODE", "UNIQUE", "UPPER",
    "VALUE", "VAR", "VARA", "VARP", "VARPA", "VDB", "VLOOKUP", "WEEKDAY", "WEEKNUM", "WEIBULL",
    "WORKDAY", "XIRR", "XLOOKUP", "XMATCH", "XNPV", "XOR", "YEAR", "YEARFRAC", "YIELD",
    "YIELDDISC", "YIELDMAT", "ZTEST",
];

static FUNCTION_IDS: Lazy<FxHashMap<&'static str, u16>> = Lazy::new(|| {
    FUNCTION_NAMES
        .iter()
        .enumerate()
        .map(|(i, name)| (*name, (i + 1) as u16))
        .collect()
});

/// Prefixes newer Excel versions put in front of functions they added.
const FUTURE_PREFIXES: [&str; 2] = ["_xlfn.", "_xlws."];

/// Look up the id of a function by name.
///
/// Matching is case-insensitive and ignores `_xlfn.`/`_xlws.` prefixes.
pub fn function_id(name: &str) -> Option<u16> {
    let mut name = name;
    for prefix in FUTURE_PREFIXES {
        if name.len() >= prefix.len() && name[..prefix.len()].eq_ignore_ascii_case(prefix) {
            name = &name[prefix.len()..];
        }
    }
    if let Some(id) = FUNCTION_IDS.get(name) {
        return Some(*id);
    }
    FUNCTION_IDS.get(name.to_ascii_uppercase().as_str()).copied()
}

pub fn function_name(id: u16) -> Option<&'static str> {
    id.checked_sub(1)
        .and_then(|i| FUNCTION_NAMES.get(i as usize))
        .copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_round_trip_through_names() {
        assert!(FUNCTION_NAMES.len() <= MAX_FUNCTION_ID as usize);
        for (i, name) in FUNCTION_NAMES.iter().enumerate() {
            let id = function_id(name).unwrap();
            assert_eq!(id as usize, i + 1);
            assert_eq!(function_name(id), Some(*name));
        }
    }

    #[test]
    fn lookup_ignores_case_and_future_prefix() {
        assert_eq!(function_id("sum"), function_id("SUM"));
        assert_eq!(function_id("_xlfn.XLOOKUP"), function_id("XLOOKUP"));
        assert_eq!(function_id("_xlfn._xlws.SORT"), function_id("SORT"));
        assert_eq!(function_id("NOT_A_FUNCTION"), None);
        assert_eq!(function_name(0), None);
    }
}
