//! Static department directory: who to call, and how long a fix usually takes.

use crate::{Department, IssuePriority};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepartmentContact {
    pub phone: &'static str,
    pub email: &'static str,
    pub head: &'static str,
}

pub fn contact_for(department: Department) -> DepartmentContact {
    match department {
        Department::Sanitation => DepartmentContact {
            phone: "1800-XXX-XXXX",
            email: "sanitation@municipality.gov.in",
            head: "Mr. Rajesh Kumar",
        },
        Department::PublicWorks => DepartmentContact {
            phone: "1800-XXX-YYYY",
            email: "publicworks@municipality.gov.in",
            head: "Ms. Priya Sharma",
        },
        Department::TrafficPolice => DepartmentContact {
            phone: "100",
            email: "traffic@police.gov.in",
            head: "Inspector Vikram Singh",
        },
        Department::WaterDepartment => DepartmentContact {
            phone: "1800-XXX-ZZZZ",
            email: "water@municipality.gov.in",
            head: "Dr. Anjali Verma",
        },
        Department::ElectricityBoard => DepartmentContact {
            phone: "1912",
            email: "complaints@electricityboard.gov.in",
            head: "Eng. Suresh Reddy",
        },
        Department::ParksRecreation => DepartmentContact {
            phone: "1800-XXX-AAAA",
            email: "parks@municipality.gov.in",
            head: "Mr. Deepak Gupta",
        },
        Department::General => DepartmentContact {
            phone: "1800-XXX-GENERAL",
            email: "general@municipality.gov.in",
            head: "General Administrator",
        },
    }
}

pub fn estimated_resolution(department: Department, priority: IssuePriority) -> &'static str {
    use Department::*;
    use IssuePriority::*;

    match (department, priority) {
        (Sanitation, High) => "2-4 hours",
        (Sanitation, Medium) => "1-2 days",
        (Sanitation, Low) => "3-5 days",
        (PublicWorks, High) => "4-6 hours",
        (PublicWorks, Medium) => "2-3 days",
        (PublicWorks, Low) => "1-2 weeks",
        (TrafficPolice, High) => "1-2 hours",
        (TrafficPolice, Medium) => "4-8 hours",
        (TrafficPolice, Low) => "1-2 days",
        (WaterDepartment, High) => "2-4 hours",
        (WaterDepartment, Medium) => "1-2 days",
        (WaterDepartment, Low) => "3-7 days",
        (ElectricityBoard, High) => "1-3 hours",
        (ElectricityBoard, Medium) => "4-12 hours",
        (ElectricityBoard, Low) => "1-3 days",
        (ParksRecreation, High) => "1 day",
        (ParksRecreation, Medium) => "3-5 days",
        (ParksRecreation, Low) => "1-2 weeks",
        (General, _) => "3-7 days",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn general_gets_the_catch_all_desk() {
        assert_eq!(contact_for(Department::General).head, "General Administrator");
        assert_eq!(
            estimated_resolution(Department::General, IssuePriority::High),
            "3-7 days"
        );
        assert_eq!(
            estimated_resolution(Department::TrafficPolice, IssuePriority::High),
            "1-2 hours"
        );
    }
}
