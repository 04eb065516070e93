/// Sample import template offered to users who want a known-good layout:
/// one activity per row across all six kinds and all three scopes.
pub fn sample_template_csv() -> String {
    let mut csv = String::from("Date,Category,Amount,Unit,Scope,Location,Notes\n");
    let rows = [
        "2024-01-15,Electricity,10500,kWh,Scope 2,Main Office,Monthly grid consumption",
        "2024-01-31,Diesel Fuel,450,litres,Scope 1,Fleet Depot,Delivery vans",
        "2024-02-10,Natural Gas (Heating Fuel),1200,m3,Scope 1,Main Office,Boiler",
        "2024-02-18,Company Car Travel,850,km,Scope 3,Sales Team,Client visits",
        "2024-03-05,Refrigerant R-410A,2.5,kg,Scope 1,Server Room,AC top-up",
        "2024-03-12,Business Flight (Long-haul),3500,km,Scope 3,Head Office,Conference",
        "2024-03-20,Landfill Waste,300,kg,Scope 3,Main Office,General bins",
        "2024-03-25,Recycled Paper,120,kg,Scope 3,Main Office,Shredding",
        "2024-03-30,Water Supply,85,m3,Scope 3,Main Office,Municipal meter",
    ];
    for row in rows {
        csv.push_str(row);
        csv.push('\n');
    }
    csv
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_has_nine_rows() {
        let csv = sample_template_csv();
        assert_eq!(csv.lines().count(), 10);
        assert!(csv.starts_with("Date,Category,Amount,Unit,Scope,Location,Notes"));
    }
}
